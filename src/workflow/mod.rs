//! Workflow Definition Module
//!
//! Data structures, persistence and validation for workflows.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (Workflow, Task, Parameter)
//! - [`parser`]: YAML/JSON workflow file loading
//! - [`validator`]: Structural validation and reference warnings
//! - [`store`]: File-backed workflow collection

pub mod model;
pub mod parser;
pub mod store;
pub mod validator;

pub use model::{Parameter, Task, TaskType, Workflow};
pub use parser::{load_workflows, parse_workflows};
pub use store::{StoreError, WorkflowStore};
pub use validator::{reference_warnings, validate_workflow};
