//! Run results and failure kinds.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Why a task run failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("No commands to run")]
    NoCommandsDefined,

    #[error("No parameters defined for script task")]
    NoParametersDefined,

    #[error("Script not found: {0}")]
    ScriptNotFound(String),

    #[error("Failed to load script '{id}': {message}")]
    ScriptLoadFailed { id: String, message: String },

    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingRequiredParameters(Vec<String>),

    #[error("Script '{0}' has nothing invocable")]
    ScriptNotInvocable(String),

    #[error("Script execution failed: {0}")]
    ScriptExecutionError(String),

    #[error("Failed to launch terminal: {0}")]
    TerminalLaunchError(String),
}

impl TaskError {
    /// Stable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTask(_) => "InvalidTask",
            Self::NoCommandsDefined => "NoCommandsDefined",
            Self::NoParametersDefined => "NoParametersDefined",
            Self::ScriptNotFound(_) => "ScriptNotFound",
            Self::ScriptLoadFailed { .. } => "ScriptLoadFailed",
            Self::MissingRequiredParameters(_) => "MissingRequiredParameters",
            Self::ScriptNotInvocable(_) => "ScriptNotInvocable",
            Self::ScriptExecutionError(_) => "ScriptExecutionError",
            Self::TerminalLaunchError(_) => "TerminalLaunchError",
        }
    }
}

/// Where a script run currently is. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Resolving,
    Validating,
    Loading,
    Invoking,
    Succeeded,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Validating => "validating",
            Self::Loading => "loading",
            Self::Invoking => "invoking",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Structured result of one task run.
///
/// Every failure is reported here; running a task never returns `Err`.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Failure kind, see [`TaskError::kind`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_path: Option<String>,
}

impl RunResult {
    /// Result of a command task whose terminal was started.
    pub fn launched() -> Self {
        Self {
            success: true,
            message: Some("Terminal launched".to_string()),
            ..Self::default()
        }
    }

    /// Result of a script task that completed.
    pub fn succeeded(script_id: &str, output: Option<Value>, message: Option<String>) -> Self {
        Self {
            success: true,
            message,
            output,
            script_id: Some(script_id.to_string()),
            ..Self::default()
        }
    }

    pub fn failed(error: &TaskError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            ..Self::default()
        }
    }

    /// Attaches script diagnostics.
    pub fn with_script(mut self, script_id: &str, script_path: Option<String>) -> Self {
        self.script_id = Some(script_id.to_string());
        self.script_path = script_path;
        self
    }
}
