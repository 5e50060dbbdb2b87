//! External Executable Scripts
//!
//! Runs a script file as a child process. Parameters are written to
//! the child's stdin as a JSON object; a zero exit status is success
//! and stdout becomes the task output.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use log::{debug, error};
use serde_json::Value;

use super::module::{Completion, ScriptError, ScriptModule, ScriptOutcome, ScriptParams, ScriptResult};

/// A script file run through an optional interpreter.
#[derive(Debug, Clone)]
pub struct ExecutableScript {
    path: PathBuf,
    interpreter: Option<String>,
}

impl ExecutableScript {
    pub fn new(path: impl Into<PathBuf>, interpreter: Option<String>) -> Self {
        Self {
            path: path.into(),
            interpreter,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn command(&self) -> Command {
        match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(&self.path);
                cmd
            }
            None => Command::new(&self.path),
        }
    }

    /// Runs the child to completion.
    fn execute(&self, params: &ScriptParams) -> ScriptOutcome {
        let input = serde_json::to_vec(params)?;

        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("Failed to start {}: {}", self.path.display(), e))?;

        // Feed stdin while the output is drained
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || match stdin.write_all(&input) {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            })
        });

        let output = child.wait_with_output()?;

        if let Some(writer) = writer {
            match writer.join() {
                Ok(Err(e)) => debug!("Could not write parameters to {}: {}", self.path.display(), e),
                Err(_) => debug!("Parameter writer for {} panicked", self.path.display()),
                Ok(Ok(())) => {}
            }
        }
        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                "Script {} failed with exit code: {:?}",
                self.path.display(),
                output.status.code()
            );
            if !stdout.trim().is_empty() {
                debug!("stdout:\n{}", stdout);
            }

            let detail = stderr.trim();
            return Err(if detail.is_empty() {
                ScriptError::new(format!(
                    "Script exited with code {:?}",
                    output.status.code()
                ))
            } else {
                ScriptError::new(detail)
            });
        }

        Ok(parse_stdout(&stdout))
    }
}

/// Interprets a successful child's stdout.
///
/// A JSON object with a boolean `success` field is taken as a full
/// [`ScriptResult`]; other JSON becomes the output; anything else is
/// kept as a string. Empty stdout means no output.
fn parse_stdout(stdout: &str) -> ScriptResult {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return ScriptResult::message("Script completed");
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) if value.get("success").is_some_and(Value::is_boolean) => {
            serde_json::from_value(value.clone()).unwrap_or_else(|_| ScriptResult::with_output(value))
        }
        Ok(value) => ScriptResult::with_output(value),
        Err(_) => ScriptResult::with_output(Value::String(trimmed.to_string())),
    }
}

impl ScriptModule for ExecutableScript {
    fn run(&self, params: ScriptParams, completion: Completion) {
        let script = self.clone();
        thread::spawn(move || {
            let outcome = script.execute(&params);
            completion.finish(outcome);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_stdout_empty() {
        let result = parse_stdout("  \n");
        assert!(result.success);
        assert!(result.output.is_none());
    }

    #[test]
    fn test_parse_stdout_json_output() {
        let result = parse_stdout(r#"{"count": 3}"#);
        assert_eq!(result.output, Some(json!({"count": 3})));
    }

    #[test]
    fn test_parse_stdout_full_result() {
        let result = parse_stdout(r#"{"success": false, "error": "nope"}"#);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("nope"));
    }

    #[test]
    fn test_parse_stdout_text() {
        let result = parse_stdout("hello world\n");
        assert_eq!(result.output, Some(json!("hello world")));
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/bash\n{}\n", body)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_executable_receives_params_on_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(dir.path(), "echo.sh", "cat");

        let script = ExecutableScript::new(path, Some("bash".to_string()));
        let (completion, receiver) = Completion::channel();

        let mut params = ScriptParams::new();
        params.insert("name".to_string(), "Ada".to_string());
        script.run(params, completion);

        let result = receiver.await.unwrap().unwrap();
        assert_eq!(result.output, Some(json!({"name": "Ada"})));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_executable_failure_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(dir.path(), "fail.sh", "echo 'bad input' >&2\nexit 3");

        let script = ExecutableScript::new(path, Some("bash".to_string()));
        let (completion, receiver) = Completion::channel();
        script.run(ScriptParams::new(), completion);

        let error = receiver.await.unwrap().unwrap_err();
        assert_eq!(error.message, "bad input");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_ignoring_stdin_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(dir.path(), "quiet.sh", r#"echo '{"a":1}'"#);

        let script = ExecutableScript::new(path, Some("sh".to_string()));
        let (completion, receiver) = Completion::channel();

        let mut params = ScriptParams::new();
        params.insert("blob".to_string(), "x".repeat(1 << 20));
        script.run(params, completion);

        let result = receiver.await.unwrap().unwrap();
        assert_eq!(result.output, Some(json!({"a": 1})));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_large_output_before_reading_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(
            dir.path(),
            "chatty.sh",
            "head -c 262144 /dev/zero | tr '\\0' 'a'\ncat > /dev/null",
        );

        let script = ExecutableScript::new(path, Some("bash".to_string()));
        let (completion, receiver) = Completion::channel();

        let mut params = ScriptParams::new();
        params.insert("blob".to_string(), "y".repeat(1 << 18));
        script.run(params, completion);

        let result = receiver.await.unwrap().unwrap();
        let text = result.output.unwrap();
        assert_eq!(text.as_str().map(str::len), Some(262144));
    }

    #[tokio::test]
    async fn test_missing_program_fails() {
        let script = ExecutableScript::new("/nonexistent/script.sh", None);
        let (completion, receiver) = Completion::channel();
        script.run(ScriptParams::new(), completion);

        let error = receiver.await.unwrap().unwrap_err();
        assert!(error.message.contains("Failed to start"));
    }
}
