//! Built-in Scripts
//!
//! Scripts that ship with the application and are always available:
//!
//! - `default`: echoes its parameters
//! - `system-info`: host, OS, CPU and memory facts
//! - `user-greeting`: composes a greeting, typically from other tasks' output
//! - `file-operations`: read/write/append/delete a file
//! - `data-transform`: converts between JSON, CSV and XML

use std::sync::Arc;

use log::info;
use serde_json::json;

use super::module::{FnScript, ScriptModule, ScriptOutcome, ScriptParams, ScriptResult};
use super::registry::{ScriptDefinition, DEFAULT_SCRIPT_ID};

mod data_transform;
mod file_operations;
mod system_info;
mod user_greeting;

/// Returns every built-in definition paired with its handler.
pub fn builtin_scripts() -> Vec<(ScriptDefinition, Arc<dyn ScriptModule>)> {
    vec![
        (
            ScriptDefinition::new(DEFAULT_SCRIPT_ID, "Default Script")
                .with_description("Basic script that logs all parameters"),
            handler(default_handler),
        ),
        (
            ScriptDefinition::new("system-info", "System Information")
                .with_description("Returns OS, CPU, memory and user details"),
            handler(system_info::run),
        ),
        (
            ScriptDefinition::new("user-greeting", "User Greeting")
                .with_description("Builds a greeting from other tasks' output")
                .with_required(&["platform"]),
            handler(user_greeting::run),
        ),
        (
            ScriptDefinition::new("file-operations", "File Operations")
                .with_description("Reads, writes, appends to or deletes a file")
                .with_required(&["filePath", "operation"]),
            handler(file_operations::run),
        ),
        (
            ScriptDefinition::new("data-transform", "Data Transform")
                .with_description("Converts data between json, csv and xml")
                .with_required(&["inputFormat", "outputFormat"]),
            handler(data_transform::run),
        ),
    ]
}

fn handler<F>(f: F) -> Arc<dyn ScriptModule>
where
    F: Fn(&ScriptParams) -> ScriptOutcome + Send + Sync + 'static,
{
    Arc::new(FnScript::new(f))
}

fn default_handler(params: &ScriptParams) -> ScriptOutcome {
    info!("Task parameters:");
    for (key, value) in params {
        info!("  {} = {}", key, value);
    }

    Ok(ScriptResult {
        message: Some("Task completed".to_string()),
        ..ScriptResult::with_output(json!({ "parameters": params }))
    })
}

/// Returns a non-empty parameter or a "required" error.
fn required<'a>(params: &'a ScriptParams, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("{} parameter is required", key))
}

/// Returns a parameter if present and non-empty.
fn optional<'a>(params: &'a ScriptParams, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str).filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_handler_echoes_parameters() {
        let mut params = ScriptParams::new();
        params.insert("a".to_string(), "1".to_string());

        let result = default_handler(&params).unwrap();
        assert!(result.success);
        assert_eq!(result.output.unwrap()["parameters"]["a"], "1");
        assert_eq!(result.message.as_deref(), Some("Task completed"));
    }

    #[test]
    fn test_required_and_optional() {
        let mut params = ScriptParams::new();
        params.insert("present".to_string(), " value ".to_string());
        params.insert("blank".to_string(), "  ".to_string());

        assert_eq!(required(&params, "present"), Ok("value"));
        assert!(required(&params, "blank").is_err());
        assert_eq!(
            required(&params, "absent"),
            Err("absent parameter is required".to_string())
        );
        assert_eq!(optional(&params, "present"), Some(" value "));
        assert_eq!(optional(&params, "blank"), None);
    }

    #[test]
    fn test_builtin_ids_unique() {
        let scripts = builtin_scripts();
        let mut ids: Vec<_> = scripts.iter().map(|(d, _)| d.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), scripts.len());
    }
}
