//! Script Module Contract
//!
//! A script is a unit of work that receives the resolved parameter
//! mapping and reports exactly one result through a [`Completion`].
//! The completion may be signalled synchronously inside
//! [`ScriptModule::run`] or later from another thread or task.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

/// Resolved parameters passed to a script.
pub type ScriptParams = BTreeMap<String, String>;

/// Result reported by a script on completion.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ScriptResult {
    /// Whether the script considers its work done
    pub success: bool,

    /// Structured output other tasks can reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Failure description when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScriptResult {
    /// A successful result carrying output.
    pub fn with_output(output: Value) -> Self {
        Self {
            success: true,
            output: Some(output),
            ..Self::default()
        }
    }

    /// A successful result without output.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Error reported by a script.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ScriptError {
    pub message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ScriptError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ScriptError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for ScriptError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<serde_json::Error> for ScriptError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Outcome delivered through a completion.
pub type ScriptOutcome = Result<ScriptResult, ScriptError>;

/// Single-use completion handle.
///
/// Signalling consumes the handle, so a script can report at most one
/// result. Dropping it without signalling is reported to the waiting
/// runner as an execution error.
pub struct Completion {
    sender: oneshot::Sender<ScriptOutcome>,
}

impl Completion {
    /// Creates a completion and the receiver that observes it.
    pub fn channel() -> (Self, oneshot::Receiver<ScriptOutcome>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    /// Reports the outcome.
    pub fn finish(self, outcome: ScriptOutcome) {
        // The receiver is gone only if the runner itself was dropped.
        let _ = self.sender.send(outcome);
    }

    /// Reports success.
    pub fn succeed(self, result: ScriptResult) {
        self.finish(Ok(result));
    }

    /// Reports failure.
    pub fn fail(self, error: impl Into<ScriptError>) {
        self.finish(Err(error.into()));
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// A loadable unit of work.
pub trait ScriptModule: Send + Sync {
    /// Starts the script. Must eventually signal `completion` once.
    fn run(&self, params: ScriptParams, completion: Completion);
}

/// Adapts a synchronous function into a [`ScriptModule`].
///
/// # Example
///
/// ```
/// use jarvis::scripts::{FnScript, ScriptResult};
/// use serde_json::json;
///
/// let script = FnScript::new(|params| {
///     let name = params.get("name").cloned().unwrap_or_default();
///     Ok(ScriptResult::with_output(json!({ "name": name })))
/// });
/// ```
pub struct FnScript<F> {
    handler: F,
}

impl<F> FnScript<F>
where
    F: Fn(&ScriptParams) -> ScriptOutcome + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> ScriptModule for FnScript<F>
where
    F: Fn(&ScriptParams) -> ScriptOutcome + Send + Sync,
{
    fn run(&self, params: ScriptParams, completion: Completion) {
        completion.finish((self.handler)(&params));
    }
}
