//! Workflow Data Model
//!
//! Core data structures representing workflows, their tasks and task
//! parameters.
//!
//! # Example YAML Format
//!
//! ```yaml
//! id: deploy
//! name: Deploy staging
//! tasks:
//!   - id: "1"
//!     name: Collect system info
//!     type: script-executor
//!     scriptId: system-info
//!     parameters:
//!       - key: verbose
//!         value: "yes"
//!
//!   - id: "2"
//!     name: Greet
//!     type: script-executor
//!     scriptId: user-greeting
//!     parameters:
//!       - key: platform
//!         value: ${task-1.output.os.platform}
//!
//!   - id: "3"
//!     name: Build
//!     commands:
//!       - cargo build --release
//! ```

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a task is executed.
///
/// Any type name other than `script-executor` (or its legacy alias
/// `key-value`) is classified as a command task.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(from = "String", into = "String")]
pub enum TaskType {
    /// Shell commands handed to a terminal window
    #[default]
    Command,
    /// A registered script invoked in-process
    ScriptExecutor,
}

impl TaskType {
    /// Returns the wire name of this task type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::ScriptExecutor => "script-executor",
        }
    }
}

impl From<String> for TaskType {
    fn from(value: String) -> Self {
        match value.trim() {
            "script-executor" | "key-value" => Self::ScriptExecutor,
            _ => Self::Command,
        }
    }
}

impl From<TaskType> for String {
    fn from(value: TaskType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single key/value parameter of a script task.
///
/// The value may embed variable references such as
/// `${task-1.output.user.name}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Parameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Returns true if the value contains variable reference syntax.
    pub fn has_references(&self) -> bool {
        self.value.contains("${")
    }
}

/// Represents a single task in a workflow.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier within the workflow
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Execution type (defaults to command)
    #[serde(rename = "type", default)]
    pub task_type: TaskType,

    /// Shell commands, used when `task_type` is `Command`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,

    /// Script parameters, used when `task_type` is `ScriptExecutor`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,

    /// Identifier of the registered script to invoke
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,
}

/// Accepts either a JSON string or a number as an identifier.
///
/// Older stores generated numeric millisecond ids.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(de::Error::custom("Expected string or number identifier")),
    }
}

impl Task {
    /// Creates a command task with no commands.
    ///
    /// # Example
    ///
    /// ```
    /// use jarvis::workflow::Task;
    ///
    /// let task = Task::command("build", "Build")
    ///     .with_command("cargo build")
    ///     .with_command("cargo test");
    /// assert_eq!(task.commands.len(), 2);
    /// ```
    pub fn command(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            name: name.into(),
            task_type: TaskType::Command,
            commands: Vec::new(),
            parameters: Vec::new(),
            script_id: None,
        }
    }

    /// Creates a script task bound to the given script.
    ///
    /// # Example
    ///
    /// ```
    /// use jarvis::workflow::{Task, TaskType};
    ///
    /// let task = Task::script("2", "Greet", "user-greeting")
    ///     .with_parameter("platform", "${task-1.output.os.platform}");
    /// assert_eq!(task.task_type, TaskType::ScriptExecutor);
    /// ```
    pub fn script(
        id: impl Into<String>,
        name: impl Into<String>,
        script_id: impl Into<String>,
    ) -> Self {
        Self {
            task_type: TaskType::ScriptExecutor,
            script_id: Some(script_id.into()),
            ..Self::command(id, name)
        }
    }

    /// Appends a shell command.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    /// Appends a parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(Parameter::new(key, value));
        self
    }

    /// Returns true if this task runs a script rather than commands.
    pub fn is_script(&self) -> bool {
        self.task_type == TaskType::ScriptExecutor
    }

    /// Gets a parameter by key.
    pub fn parameter(&self, key: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.key == key)
    }

    /// Sets a parameter value, adding the parameter if it doesn't exist.
    pub fn set_parameter(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.parameters.iter_mut().find(|p| p.key == key) {
            Some(param) => param.value = value,
            None => self.parameters.push(Parameter::new(key, value)),
        }
    }

    /// Removes a parameter. Returns true if it was present.
    pub fn remove_parameter(&mut self, key: &str) -> bool {
        let before = self.parameters.len();
        self.parameters.retain(|p| p.key != key);
        self.parameters.len() != before
    }
}

/// Represents a complete workflow with multiple tasks.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Workflow {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Ordered list of tasks in the workflow
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Workflow {
    /// Creates a new empty workflow.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Adds a task to the workflow.
    pub fn add_task(&mut self, task: Task) -> Result<(), String> {
        if self.tasks.iter().any(|t| t.id == task.id) {
            return Err(format!("Task '{}' already exists", task.id));
        }
        self.tasks.push(task);
        Ok(())
    }

    /// Removes a task from the workflow.
    pub fn remove_task(&mut self, id: &str) -> Result<Task, String> {
        let index = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| format!("Task '{}' not found", id))?;
        Ok(self.tasks.remove(index))
    }

    /// Gets a task by ID.
    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Gets a mutable reference to a task by ID.
    pub fn get_task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Returns the number of tasks in the workflow.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if the workflow has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_defaults_to_command() {
        let task: Task = serde_json::from_str(r#"{"id": "1", "name": "t"}"#).unwrap();
        assert_eq!(task.task_type, TaskType::Command);
    }

    #[test]
    fn test_task_type_parsing() {
        assert_eq!(TaskType::from("script-executor".to_string()), TaskType::ScriptExecutor);
        assert_eq!(TaskType::from("key-value".to_string()), TaskType::ScriptExecutor);
        assert_eq!(TaskType::from("command".to_string()), TaskType::Command);
        assert_eq!(TaskType::from("something-else".to_string()), TaskType::Command);
    }

    #[test]
    fn test_task_type_serializes_wire_name() {
        let task = Task::script("1", "s", "default");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["type"], "script-executor");
        assert_eq!(json["scriptId"], "default");
    }

    #[test]
    fn test_numeric_ids_accepted() {
        let workflow: Workflow = serde_json::from_str(
            r#"{"id": 1712345678901, "name": "w", "tasks": [{"id": 42, "commands": ["ls"]}]}"#,
        )
        .unwrap();

        assert_eq!(workflow.id, "1712345678901");
        assert_eq!(workflow.tasks[0].id, "42");
        assert_eq!(workflow.tasks[0].commands, vec!["ls"]);
    }

    #[test]
    fn test_invalid_id_rejected() {
        let result: Result<Task, _> = serde_json::from_str(r#"{"id": true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_task_builders() {
        let task = Task::script("2", "Greet", "user-greeting")
            .with_parameter("platform", "linux")
            .with_parameter("greeting", "Hi");

        assert!(task.is_script());
        assert_eq!(task.parameters.len(), 2);
        assert_eq!(task.parameter("greeting").unwrap().value, "Hi");
        assert!(task.parameter("missing").is_none());
    }

    #[test]
    fn test_set_and_remove_parameter() {
        let mut task = Task::script("1", "t", "default").with_parameter("a", "1");

        task.set_parameter("a", "2");
        task.set_parameter("b", "3");
        assert_eq!(task.parameter("a").unwrap().value, "2");
        assert_eq!(task.parameters.len(), 2);

        assert!(task.remove_parameter("a"));
        assert!(!task.remove_parameter("a"));
        assert_eq!(task.parameters.len(), 1);
    }

    #[test]
    fn test_parameter_has_references() {
        assert!(Parameter::new("k", "Hello ${task-1.output.name}").has_references());
        assert!(!Parameter::new("k", "Hello $name").has_references());
    }

    #[test]
    fn test_workflow_add_task() {
        let mut workflow = Workflow::new("w", "Workflow");
        let task = Task::command("1", "t");

        assert!(workflow.add_task(task.clone()).is_ok());
        assert!(workflow.add_task(task).is_err()); // Duplicate
        assert_eq!(workflow.len(), 1);
    }

    #[test]
    fn test_workflow_remove_task() {
        let mut workflow = Workflow::new("w", "Workflow");
        workflow.add_task(Task::command("1", "a")).unwrap();
        workflow.add_task(Task::command("2", "b")).unwrap();

        let removed = workflow.remove_task("1").unwrap();
        assert_eq!(removed.name, "a");
        assert_eq!(workflow.tasks[0].id, "2");
        assert!(workflow.remove_task("nonexistent").is_err());
    }

    #[test]
    fn test_workflow_get_task_mut() {
        let mut workflow = Workflow::new("w", "Workflow");
        workflow.add_task(Task::command("1", "t")).unwrap();

        workflow.get_task_mut("1").unwrap().commands.push("echo hi".to_string());
        assert_eq!(workflow.get_task("1").unwrap().commands, vec!["echo hi"]);
        assert!(workflow.get_task("2").is_none());
    }

    #[test]
    fn test_yaml_workflow() {
        let yaml = r#"
id: deploy
name: Deploy
tasks:
  - id: "1"
    type: script-executor
    scriptId: system-info
    parameters:
      - key: verbose
        value: "yes"
  - id: "2"
    commands:
      - cargo build
"#;
        let workflow: Workflow = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(workflow.len(), 2);
        assert!(workflow.tasks[0].is_script());
        assert_eq!(workflow.tasks[0].script_id.as_deref(), Some("system-info"));
        assert!(!workflow.tasks[1].is_script());
    }
}
