//! Personalised greeting built from parameters.
//!
//! Usually fed from another task's output, e.g.
//! `platform = ${task-1.output.os.platform}`.

use chrono::{Local, Utc};
use serde_json::json;

use super::optional;
use crate::scripts::module::{ScriptOutcome, ScriptParams, ScriptResult};

pub(super) fn run(params: &ScriptParams) -> ScriptOutcome {
    let username = optional(params, "username").unwrap_or("User");
    let platform = optional(params, "platform").unwrap_or("unknown platform");
    let memory = optional(params, "memory").unwrap_or("unknown memory");
    let greeting = optional(params, "greeting").unwrap_or("Hello");

    let message = format!(
        "{}, {}!\nYou are using {} with {} of RAM.\nThe current time is {}.",
        greeting,
        username,
        platform,
        memory,
        Local::now().format("%H:%M:%S")
    );

    Ok(ScriptResult::with_output(json!({
        "message": message,
        "timestamp": Utc::now().timestamp_millis(),
        "details": {
            "greeting": greeting,
            "username": username,
            "platform": platform,
            "memory": memory,
        },
    })))
}
