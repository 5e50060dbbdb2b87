//! Workflow Validation
//!
//! Structural checks for imported workflows:
//! - Workflow and task IDs are present
//! - Task IDs are unique within the workflow
//! - Parameter keys are unique within a task
//!
//! Variable references to tasks outside the workflow are reported as
//! warnings only; they soft-fail at run time.

use std::collections::HashSet;

use log::{debug, info, warn};

use super::model::{Task, Workflow};
use crate::variables::reference::{scan, Token, VariableReference};

/// Validation error types for user-friendly error messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyWorkflowId,
    EmptyTaskId,
    DuplicateTaskId(String),
    DuplicateParameterKey { task: String, key: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyWorkflowId => write!(f, "Workflow has empty or whitespace-only ID"),
            Self::EmptyTaskId => write!(f, "Task has empty or whitespace-only ID"),
            Self::DuplicateTaskId(id) => write!(f, "Duplicate task ID: '{}'", id),
            Self::DuplicateParameterKey { task, key } => {
                write!(f, "Task '{}' defines parameter '{}' more than once", task, key)
            }
        }
    }
}

fn validate_task(task: &Task) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if task.id.trim().is_empty() {
        errors.push(ValidationError::EmptyTaskId);
    }

    let mut keys = HashSet::new();
    for param in &task.parameters {
        if !keys.insert(param.key.as_str()) {
            errors.push(ValidationError::DuplicateParameterKey {
                task: task.id.clone(),
                key: param.key.clone(),
            });
        }
    }

    errors
}

/// Validates a workflow.
///
/// Returns every error found, joined by newlines.
pub fn validate_workflow(workflow: &Workflow) -> Result<(), String> {
    debug!("Validating workflow '{}' with {} tasks", workflow.id, workflow.len());

    let mut errors = Vec::new();
    if workflow.id.trim().is_empty() {
        errors.push(ValidationError::EmptyWorkflowId);
    }

    let mut seen_ids = HashSet::new();
    for task in &workflow.tasks {
        errors.extend(validate_task(task));
        if !task.id.trim().is_empty() && !seen_ids.insert(task.id.as_str()) {
            errors.push(ValidationError::DuplicateTaskId(task.id.clone()));
        }
    }

    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(messages.join("\n"));
    }

    for warning in reference_warnings(workflow) {
        warn!("{}", warning);
    }

    info!("Workflow '{}' validated: {} tasks", workflow.id, workflow.len());
    Ok(())
}

/// Lists parameter references that can never resolve within this
/// workflow: malformed ones and those naming a task it doesn't contain.
pub fn reference_warnings(workflow: &Workflow) -> Vec<String> {
    let task_ids: HashSet<_> = workflow.tasks.iter().map(|t| t.id.as_str()).collect();
    let mut warnings = Vec::new();

    for task in &workflow.tasks {
        for param in task.parameters.iter().filter(|p| p.has_references()) {
            for token in scan(&param.value) {
                let Token::Expression { raw, path } = token else {
                    continue;
                };
                match VariableReference::parse(path) {
                    Ok(reference) if !task_ids.contains(reference.task_id.as_str()) => {
                        warnings.push(format!(
                            "Task '{}': parameter '{}' references unknown task '{}'",
                            task.id, param.key, reference.task_id
                        ));
                    }
                    Ok(_) => {}
                    Err(e) => warnings.push(format!(
                        "Task '{}': parameter '{}' has malformed reference {}: {}",
                        task.id, param.key, raw, e
                    )),
                }
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow_with(tasks: Vec<Task>) -> Workflow {
        Workflow {
            tasks,
            ..Workflow::new("w", "Test")
        }
    }

    #[test]
    fn test_valid_workflow() {
        let workflow = workflow_with(vec![
            Task::script("1", "Info", "system-info").with_parameter("a", "b"),
            Task::script("2", "Greet", "user-greeting")
                .with_parameter("platform", "${task-1.output.os.platform}"),
        ]);
        assert!(validate_workflow(&workflow).is_ok());
        assert!(reference_warnings(&workflow).is_empty());
    }

    #[test]
    fn test_empty_workflow_is_valid() {
        assert!(validate_workflow(&Workflow::new("w", "Empty")).is_ok());
    }

    #[test]
    fn test_duplicate_ids() {
        let workflow = workflow_with(vec![
            Task::command("1", "A"),
            Task::command("1", "B"),
        ]);
        let err = validate_workflow(&workflow).unwrap_err();
        assert!(err.contains("Duplicate task ID: '1'"));
    }

    #[test]
    fn test_empty_ids() {
        let workflow = Workflow {
            tasks: vec![Task::command(" ", "Blank")],
            ..Workflow::new("", "No id")
        };
        let err = validate_workflow(&workflow).unwrap_err();
        assert!(err.contains("Workflow has empty"));
        assert!(err.contains("Task has empty"));
    }

    #[test]
    fn test_duplicate_parameter_key() {
        let workflow = workflow_with(vec![Task::script("1", "S", "default")
            .with_parameter("k", "a")
            .with_parameter("k", "b")]);
        let err = validate_workflow(&workflow).unwrap_err();
        assert_eq!(err, "Task '1' defines parameter 'k' more than once");
    }

    #[test]
    fn test_reference_warnings() {
        let workflow = workflow_with(vec![Task::script("1", "S", "default")
            .with_parameter("a", "${task-9.output.x}")
            .with_parameter("b", "${task-1.result}")]);

        let warnings = reference_warnings(&workflow);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("unknown task '9'"));
        assert!(warnings[1].contains("malformed reference ${task-1.result}"));

        // Warnings never fail validation
        assert!(validate_workflow(&workflow).is_ok());
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::DuplicateTaskId("x".into());
        assert_eq!(err.to_string(), "Duplicate task ID: 'x'");
    }
}
