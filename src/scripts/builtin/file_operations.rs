//! Basic file manipulation: read, write, append, delete.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;
use serde_json::json;

use super::{optional, required};
use crate::scripts::module::{ScriptOutcome, ScriptParams, ScriptResult};

fn absolute(path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

pub(super) fn run(params: &ScriptParams) -> ScriptOutcome {
    let file_path = required(params, "filePath")?;
    let operation = required(params, "operation")?.to_lowercase();

    let path = absolute(file_path);
    info!("Performing {} operation on {}", operation, path.display());

    let content = match operation.as_str() {
        "read" => {
            if !path.exists() {
                return Err("File does not exist".into());
            }
            Some(fs::read_to_string(&path)?)
        }
        "write" => {
            let content = optional(params, "content")
                .ok_or("content parameter is required for write operation")?;
            fs::write(&path, content)?;
            None
        }
        "append" => {
            let content = optional(params, "content")
                .ok_or("content parameter is required for append operation")?;
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(content.as_bytes())?;
            None
        }
        "delete" => {
            if !path.exists() {
                return Err("File does not exist".into());
            }
            fs::remove_file(&path)?;
            None
        }
        other => return Err(format!("Unsupported operation: {}", other).into()),
    };

    let mut output = json!({
        "operation": operation,
        "path": path.display().to_string(),
    });
    if let Some(content) = content {
        output["content"] = json!(content);
    }

    Ok(ScriptResult::with_output(output))
}
