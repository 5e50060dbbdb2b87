//! Task Runner
//!
//! Single entry point for running a task of a workflow:
//! - Command tasks are handed to a terminal launcher and not awaited
//! - Script tasks resolve their parameters, pass the required-parameter
//!   gate, invoke the script and record its output in the cache
//!
//! Failures never escape as errors; they come back as a [`RunResult`]
//! with `success == false`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::scripts::{
    Completion, ScriptDefinition, ScriptModule, ScriptParams, ScriptRegistry, ScriptResult,
    DEFAULT_SCRIPT_ID,
};
use crate::terminal::TerminalLauncher;
use crate::variables::{resolve, ResolvedParameters};
use crate::workflow::{Task, Workflow};

use super::cache::OutputCache;
use super::result::{RunPhase, RunResult, TaskError};

/// Traces the phase of one script run at debug level.
struct PhaseTracker<'a> {
    task_id: &'a str,
    phase: RunPhase,
}

impl<'a> PhaseTracker<'a> {
    fn new(task_id: &'a str) -> Self {
        Self {
            task_id,
            phase: RunPhase::Idle,
        }
    }

    fn enter(&mut self, next: RunPhase) {
        debug!("Task '{}': {} -> {}", self.task_id, self.phase, next);
        self.phase = next;
    }
}

/// Runs workflow tasks against a script registry, a terminal launcher
/// and a shared output cache.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use jarvis::execution::{OutputCache, TaskRunner};
/// use jarvis::scripts::ScriptCatalog;
/// use jarvis::terminal::SystemTerminal;
/// use jarvis::workflow::Task;
///
/// # async fn demo() {
/// let runner = TaskRunner::new(
///     Arc::new(ScriptCatalog::with_builtins("scripts")),
///     Arc::new(SystemTerminal::detect()),
///     OutputCache::new(),
/// );
///
/// let task = Task::script("1", "Info", "system-info").with_parameter("verbose", "yes");
/// let result = runner.run_task(&task, "workflow-1", None).await;
/// assert!(result.success);
/// # }
/// ```
pub struct TaskRunner {
    registry: Arc<dyn ScriptRegistry>,
    launcher: Arc<dyn TerminalLauncher>,
    cache: OutputCache,
    default_terminal: Option<String>,
}

impl TaskRunner {
    pub fn new(
        registry: Arc<dyn ScriptRegistry>,
        launcher: Arc<dyn TerminalLauncher>,
        cache: OutputCache,
    ) -> Self {
        Self {
            registry,
            launcher,
            cache,
            default_terminal: None,
        }
    }

    /// Sets the terminal used when a run names none.
    pub fn set_default_terminal(&mut self, terminal: impl Into<String>) {
        self.default_terminal = Some(terminal.into());
    }

    /// The output cache this runner writes to.
    pub fn cache(&self) -> &OutputCache {
        &self.cache
    }

    /// Runs one task of the workflow `workflow_id`.
    pub async fn run_task(&self, task: &Task, workflow_id: &str, terminal: Option<&str>) -> RunResult {
        info!("Running task '{}' ({}) of workflow '{}'", task.id, task.task_type, workflow_id);

        let outcome = if task.id.trim().is_empty() {
            Err(TaskError::InvalidTask("task id is empty".to_string()))
        } else if task.is_script() {
            self.run_script(task, workflow_id).await
        } else {
            self.run_commands(task, terminal)
        };

        match outcome {
            Ok(result) => {
                info!("Task '{}' completed successfully", task.id);
                result
            }
            Err(e) => {
                error!("Task '{}' failed: {}", task.id, e);
                let result = RunResult::failed(&e);
                if task.is_script() {
                    result.with_script(effective_script_id(task), None)
                } else {
                    result
                }
            }
        }
    }

    /// Looks up `task_id` in `workflow` and runs it.
    pub async fn run_workflow_task(
        &self,
        workflow: &Workflow,
        task_id: &str,
        terminal: Option<&str>,
    ) -> RunResult {
        match workflow.get_task(task_id) {
            Some(task) => self.run_task(task, &workflow.id, terminal).await,
            None => {
                let e = TaskError::InvalidTask(format!(
                    "task '{}' not found in workflow '{}'",
                    task_id, workflow.id
                ));
                error!("{}", e);
                RunResult::failed(&e)
            }
        }
    }

    /// Runs every task of `workflow` in order, continuing past failures.
    pub async fn run_workflow(
        &self,
        workflow: &Workflow,
        terminal: Option<&str>,
    ) -> Vec<(String, RunResult)> {
        let mut results = Vec::with_capacity(workflow.tasks.len());
        for task in &workflow.tasks {
            let result = self.run_task(task, &workflow.id, terminal).await;
            results.push((task.id.clone(), result));
        }
        results
    }

    fn run_commands(&self, task: &Task, terminal: Option<&str>) -> Result<RunResult, TaskError> {
        if task.commands.is_empty() {
            return Err(TaskError::NoCommandsDefined);
        }

        let selector = terminal.or(self.default_terminal.as_deref());
        self.launcher
            .run_command(selector, &task.commands)
            .map_err(|e| TaskError::TerminalLaunchError(e.to_string()))?;

        Ok(RunResult::launched())
    }

    async fn run_script(&self, task: &Task, workflow_id: &str) -> Result<RunResult, TaskError> {
        if task.parameters.is_empty() {
            return Err(TaskError::NoParametersDefined);
        }

        let mut phase = PhaseTracker::new(&task.id);
        let result = self.run_script_phases(task, workflow_id, &mut phase).await;
        phase.enter(if result.is_ok() {
            RunPhase::Succeeded
        } else {
            RunPhase::Failed
        });
        result
    }

    async fn run_script_phases(
        &self,
        task: &Task,
        workflow_id: &str,
        phase: &mut PhaseTracker<'_>,
    ) -> Result<RunResult, TaskError> {
        phase.enter(RunPhase::Resolving);
        let resolved = resolve(&task.parameters, workflow_id, &self.cache);

        phase.enter(RunPhase::Validating);
        let script_id = effective_script_id(task);
        let definition = self
            .registry
            .get_script_by_id(script_id)
            .map_err(|e| TaskError::ScriptLoadFailed {
                id: script_id.to_string(),
                message: e.to_string(),
            })?
            .ok_or_else(|| TaskError::ScriptNotFound(script_id.to_string()))?;

        check_required(&definition, &resolved)?;
        for unresolved in &resolved.unresolved {
            warn!(
                "Parameter '{}' of task '{}' keeps {} verbatim: {}",
                unresolved.key, task.id, unresolved.expression, unresolved.reason
            );
        }

        phase.enter(RunPhase::Loading);
        let module = self
            .registry
            .load(&definition)
            .map_err(|e| TaskError::ScriptLoadFailed {
                id: script_id.to_string(),
                message: e.to_string(),
            })?
            .ok_or_else(|| TaskError::ScriptNotInvocable(script_id.to_string()))?;
        let script_path = self
            .registry
            .script_path(&definition)
            .map(|p| p.display().to_string());

        phase.enter(RunPhase::Invoking);
        let result = invoke(module.as_ref(), resolved.into_values()).await?;

        if !result.success {
            let message = result
                .error
                .or(result.message)
                .unwrap_or_else(|| "script reported failure".to_string());
            return Err(TaskError::ScriptExecutionError(message));
        }

        if let Some(output) = result.output.as_ref().filter(|o| !o.is_null()) {
            self.cache.record(workflow_id, &task.id, output.clone());
        }

        Ok(RunResult::succeeded(script_id, result.output, result.message)
            .with_script(script_id, script_path))
    }
}

/// Script a task runs: its own id, or the default script.
fn effective_script_id(task: &Task) -> &str {
    task.script_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(DEFAULT_SCRIPT_ID)
}

/// Absent, blank or still-unresolved required parameters fail the run.
fn check_required(
    definition: &ScriptDefinition,
    resolved: &ResolvedParameters,
) -> Result<(), TaskError> {
    let missing: Vec<String> = definition
        .required_params
        .iter()
        .filter(|name| match resolved.get(name) {
            None => true,
            Some(value) => value.trim().is_empty() || resolved.is_unresolved(name),
        })
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(TaskError::MissingRequiredParameters(missing))
    }
}

/// Starts the module and waits for its single completion signal.
async fn invoke(module: &dyn ScriptModule, params: ScriptParams) -> Result<ScriptResult, TaskError> {
    let (completion, receiver) = Completion::channel();

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| module.run(params, completion))) {
        return Err(TaskError::ScriptExecutionError(format!(
            "script panicked: {}",
            panic_message(payload.as_ref())
        )));
    }

    match receiver.await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(TaskError::ScriptExecutionError(e.message)),
        Err(_) => Err(TaskError::ScriptExecutionError(
            "script finished without reporting completion".to_string(),
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
