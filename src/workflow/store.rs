//! Workflow Persistence
//!
//! Workflows live in a single JSON document:
//!
//! ```json
//! { "workflows": [ { "id": "...", "name": "...", "tasks": [...] } ] }
//! ```
//!
//! Every mutating operation writes the document back immediately.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::model::{Task, TaskType, Workflow};
use super::parser::load_workflows;

/// Errors raised by the workflow store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access store file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to import workflows: {0}")]
    Import(String),

    #[error("Workflow '{0}' not found")]
    WorkflowNotFound(String),

    #[error("Task '{task}' not found in workflow '{workflow}'")]
    TaskNotFound { workflow: String, task: String },

    #[error("Task '{task}' has no command at index {index}")]
    CommandIndexOutOfRange { task: String, index: usize },
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct StoreDocument {
    #[serde(default)]
    workflows: Vec<Workflow>,
}

/// File-backed collection of workflows.
///
/// # Example
///
/// ```rust,no_run
/// use jarvis::workflow::WorkflowStore;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut store = WorkflowStore::open("workflows.json")?;
///     let id = store.add_workflow("Deploy")?.id.clone();
///     store.add_task(&id, "Build", None)?;
///     Ok(())
/// }
/// ```
pub struct WorkflowStore {
    path: PathBuf,
    document: StoreDocument,
}

impl WorkflowStore {
    /// Opens the store at `path`, starting empty if the file doesn't exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let document = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str(&content)?
        } else {
            debug!("Store file {} does not exist yet", path.display());
            StoreDocument::default()
        };

        info!(
            "Opened workflow store {} ({} workflows)",
            path.display(),
            document.workflows.len()
        );
        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the document to disk.
    pub fn save(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.document)?;
        fs::write(&self.path, json).map_err(io_err)?;

        debug!("Saved workflow store to {}", self.path.display());
        Ok(())
    }

    pub fn all_workflows(&self) -> &[Workflow] {
        &self.document.workflows
    }

    pub fn get_workflow(&self, id: &str) -> Option<&Workflow> {
        self.document.workflows.iter().find(|w| w.id == id)
    }

    /// Creates an empty workflow with a generated id.
    pub fn add_workflow(&mut self, name: &str) -> Result<&Workflow, StoreError> {
        let id = generate_id(|id| self.get_workflow(id).is_some());
        let name = if name.trim().is_empty() {
            format!("Workflow {}", self.document.workflows.len() + 1)
        } else {
            name.to_string()
        };

        self.document.workflows.push(Workflow::new(id, name));
        self.save()?;

        let index = self.document.workflows.len() - 1;
        Ok(&self.document.workflows[index])
    }

    /// Adds a workflow, replacing any stored workflow with the same id.
    pub fn put_workflow(&mut self, workflow: Workflow) -> Result<(), StoreError> {
        match self.document.workflows.iter_mut().find(|w| w.id == workflow.id) {
            Some(existing) => {
                warn!("Replacing existing workflow '{}'", workflow.id);
                *existing = workflow;
            }
            None => self.document.workflows.push(workflow),
        }
        self.save()
    }

    /// Imports every workflow from a YAML or JSON file.
    ///
    /// Returns the ids of the imported workflows.
    pub fn import(&mut self, path: &str) -> Result<Vec<String>, StoreError> {
        let workflows = load_workflows(path).map_err(|e| StoreError::Import(e.to_string()))?;
        let ids: Vec<String> = workflows.iter().map(|w| w.id.clone()).collect();

        for workflow in workflows {
            match self.document.workflows.iter_mut().find(|w| w.id == workflow.id) {
                Some(existing) => {
                    warn!("Replacing existing workflow '{}'", workflow.id);
                    *existing = workflow;
                }
                None => self.document.workflows.push(workflow),
            }
        }
        self.save()?;

        info!("Imported {} workflow(s) from {}", ids.len(), path);
        Ok(ids)
    }

    pub fn rename_workflow(&mut self, id: &str, name: &str) -> Result<(), StoreError> {
        self.workflow_mut(id)?.name = name.to_string();
        self.save()
    }

    pub fn delete_workflow(&mut self, id: &str) -> Result<Workflow, StoreError> {
        let index = self
            .document
            .workflows
            .iter()
            .position(|w| w.id == id)
            .ok_or_else(|| StoreError::WorkflowNotFound(id.to_string()))?;
        let removed = self.document.workflows.remove(index);
        self.save()?;
        Ok(removed)
    }

    /// Appends a task. A script id makes it a script task.
    pub fn add_task(
        &mut self,
        workflow_id: &str,
        name: &str,
        script_id: Option<&str>,
    ) -> Result<&Task, StoreError> {
        let workflow = self.workflow_mut(workflow_id)?;
        let id = generate_id(|id| workflow.get_task(id).is_some());
        let name = if name.trim().is_empty() {
            format!("Task {}", workflow.tasks.len() + 1)
        } else {
            name.to_string()
        };

        let task = match script_id {
            Some(script) => Task::script(id, name, script),
            None => Task::command(id, name),
        };
        workflow.tasks.push(task);
        self.save()?;

        let workflow = self.workflow_mut(workflow_id)?;
        let index = workflow.tasks.len() - 1;
        Ok(&workflow.tasks[index])
    }

    /// Applies `update` to a task. The task id is kept.
    pub fn update_task<F>(&mut self, workflow_id: &str, task_id: &str, update: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Task),
    {
        let task = self.task_mut(workflow_id, task_id)?;
        let id = task.id.clone();
        update(task);
        task.id = id;
        self.save()
    }

    pub fn delete_task(&mut self, workflow_id: &str, task_id: &str) -> Result<Task, StoreError> {
        let task = self
            .workflow_mut(workflow_id)?
            .remove_task(task_id)
            .map_err(|_| StoreError::TaskNotFound {
                workflow: workflow_id.to_string(),
                task: task_id.to_string(),
            })?;
        self.save()?;
        Ok(task)
    }

    pub fn add_command(&mut self, workflow_id: &str, task_id: &str, command: &str) -> Result<(), StoreError> {
        self.task_mut(workflow_id, task_id)?
            .commands
            .push(command.to_string());
        self.save()
    }

    pub fn update_command(
        &mut self,
        workflow_id: &str,
        task_id: &str,
        index: usize,
        command: &str,
    ) -> Result<(), StoreError> {
        let task = self.task_mut(workflow_id, task_id)?;
        let slot = task
            .commands
            .get_mut(index)
            .ok_or_else(|| StoreError::CommandIndexOutOfRange {
                task: task_id.to_string(),
                index,
            })?;
        *slot = command.to_string();
        self.save()
    }

    pub fn delete_command(&mut self, workflow_id: &str, task_id: &str, index: usize) -> Result<String, StoreError> {
        let task = self.task_mut(workflow_id, task_id)?;
        if index >= task.commands.len() {
            return Err(StoreError::CommandIndexOutOfRange {
                task: task_id.to_string(),
                index,
            });
        }
        let removed = task.commands.remove(index);
        self.save()?;
        Ok(removed)
    }

    pub fn set_parameter(
        &mut self,
        workflow_id: &str,
        task_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.task_mut(workflow_id, task_id)?.set_parameter(key, value);
        self.save()
    }

    /// Removes a parameter. Returns false if the task had none by that key.
    pub fn remove_parameter(&mut self, workflow_id: &str, task_id: &str, key: &str) -> Result<bool, StoreError> {
        let removed = self.task_mut(workflow_id, task_id)?.remove_parameter(key);
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Binds a task to a script, turning it into a script task.
    pub fn set_script(&mut self, workflow_id: &str, task_id: &str, script_id: &str) -> Result<(), StoreError> {
        let task = self.task_mut(workflow_id, task_id)?;
        task.task_type = TaskType::ScriptExecutor;
        task.script_id = Some(script_id.to_string());
        self.save()
    }

    fn workflow_mut(&mut self, id: &str) -> Result<&mut Workflow, StoreError> {
        self.document
            .workflows
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| StoreError::WorkflowNotFound(id.to_string()))
    }

    fn task_mut(&mut self, workflow_id: &str, task_id: &str) -> Result<&mut Task, StoreError> {
        self.workflow_mut(workflow_id)?
            .get_task_mut(task_id)
            .ok_or_else(|| StoreError::TaskNotFound {
                workflow: workflow_id.to_string(),
                task: task_id.to_string(),
            })
    }
}

/// Millisecond timestamp id, bumped until `taken` rejects it.
fn generate_id(taken: impl Fn(&str) -> bool) -> String {
    let mut candidate = Utc::now().timestamp_millis();
    while taken(&candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}
