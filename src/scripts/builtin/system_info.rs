//! Host information as structured output.

use std::env;

use chrono::Utc;
use serde_json::{json, Value};
use sysinfo::System;

use crate::scripts::module::{ScriptOutcome, ScriptParams, ScriptResult};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

pub(super) fn run(_params: &ScriptParams) -> ScriptOutcome {
    Ok(ScriptResult::with_output(collect()))
}

/// Rounds to two decimals and appends `GB`.
fn format_gb(bytes: u64) -> String {
    let gb = (bytes as f64 / BYTES_PER_GB * 100.0).round() / 100.0;
    format!("{}GB", gb)
}

fn usage_percent(total: u64, available: u64) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    let used = 1.0 - available as f64 / total as f64;
    format!("{}%", (used * 1000.0).round() / 10.0)
}

fn collect() -> Value {
    let system = System::new_all();

    let cpu_model = system
        .cpus()
        .first()
        .map(|cpu| cpu.brand().trim().to_string())
        .unwrap_or_default();

    let username = env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_default();
    let homedir = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .unwrap_or_default();

    let uptime_hours = (System::uptime() as f64 / 3600.0 * 10.0).round() / 10.0;

    json!({
        "os": {
            "type": System::name().unwrap_or_default(),
            "platform": env::consts::OS,
            "release": System::kernel_version().unwrap_or_default(),
            "version": System::os_version().unwrap_or_default(),
            "arch": env::consts::ARCH,
        },
        "memory": {
            "total": format_gb(system.total_memory()),
            "free": format_gb(system.available_memory()),
            "usage": usage_percent(system.total_memory(), system.available_memory()),
        },
        "cpu": {
            "model": cpu_model,
            "cores": num_cpus::get(),
        },
        "network": {
            "hostname": System::host_name().unwrap_or_default(),
        },
        "user": {
            "username": username,
            "homedir": homedir,
        },
        "time": {
            "uptime": format!("{} hours", uptime_hours),
            "current": Utc::now().to_rfc3339(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_gb() {
        assert_eq!(format_gb(0), "0GB");
        assert_eq!(format_gb(16 * 1024 * 1024 * 1024), "16GB");
        assert_eq!(format_gb(1610612736), "1.5GB");
    }

    #[test]
    fn test_usage_percent() {
        assert_eq!(usage_percent(100, 25), "75%");
        assert_eq!(usage_percent(0, 0), "0%");
        assert_eq!(usage_percent(3, 2), "33.3%");
    }

    #[test]
    fn test_output_shape() {
        let result = run(&ScriptParams::new()).unwrap();
        let output = result.output.unwrap();

        assert_eq!(output["os"]["platform"], env::consts::OS);
        assert_eq!(output["os"]["arch"], env::consts::ARCH);
        assert!(output["cpu"]["cores"].as_u64().unwrap() >= 1);
        assert!(output["memory"]["total"].as_str().unwrap().ends_with("GB"));
        assert!(output["time"]["current"].is_string());
    }
}
