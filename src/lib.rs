//! Jarvis - Workflow Task Automation Engine
//!
//! Runs the tasks of user-defined workflows. Command tasks open a
//! terminal with their shell commands; script tasks invoke a registered
//! script with parameters that may reference the output of earlier
//! tasks through `${task-<id>.output.<path>}` expressions.
//!
//! # Architecture
//!
//! - [`workflow`]: Workflow data structures, files and persistence
//! - [`execution`]: Task runner and the shared output cache
//! - [`variables`]: Reference parsing and resolution
//! - [`scripts`]: Script contract, registry and built-in scripts
//! - [`terminal`]: Terminal detection and command launching
//! - [`paths`]: Default data locations
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jarvis::execution::{OutputCache, TaskRunner};
//! use jarvis::scripts::ScriptCatalog;
//! use jarvis::terminal::SystemTerminal;
//! use jarvis::workflow::Task;
//!
//! #[tokio::main]
//! async fn main() {
//!     let runner = TaskRunner::new(
//!         Arc::new(ScriptCatalog::with_builtins("scripts")),
//!         Arc::new(SystemTerminal::detect()),
//!         OutputCache::new(),
//!     );
//!
//!     let info = Task::script("1", "System info", "system-info").with_parameter("v", "1");
//!     let greet = Task::script("2", "Greet", "user-greeting")
//!         .with_parameter("platform", "${task-1.output.os.platform}");
//!
//!     runner.run_task(&info, "demo", None).await;
//!     let result = runner.run_task(&greet, "demo", None).await;
//!     println!("{:?}", result.output);
//! }
//! ```

pub mod execution;
pub mod paths;
pub mod scripts;
pub mod terminal;
pub mod variables;
pub mod workflow;

// Re-export commonly used types
pub use execution::{OutputCache, RunResult, TaskError, TaskRunner};
pub use workflow::{Parameter, Task, TaskType, Workflow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Jarvis";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "Jarvis");
    }

    #[test]
    fn test_module_exports_task() {
        let task = Task::command("1", "Build").with_command("make");
        assert_eq!(task.id, "1");
        assert_eq!(task.task_type, TaskType::Command);
    }

    #[test]
    fn test_module_exports_workflow() {
        let workflow = Workflow::new("w", "Empty");
        assert!(workflow.is_empty());
    }

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
        for part in parts {
            assert!(part.parse::<u32>().is_ok(), "Version components should be numeric");
        }
    }
}
