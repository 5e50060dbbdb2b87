//! Task Execution Module
//!
//! Runs individual workflow tasks and keeps the outputs they produce.
//!
//! # Architecture
//!
//! - [`runner`]: Dispatches command and script tasks
//! - [`cache`]: Shared store of script outputs, keyed by workflow and task
//! - [`result`]: Run results and the failure taxonomy

pub mod cache;
pub mod result;
pub mod runner;

pub use cache::{CacheKey, OutputCache};
pub use result::{RunPhase, RunResult, TaskError};
pub use runner::TaskRunner;
