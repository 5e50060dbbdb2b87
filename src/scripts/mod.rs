//! Script Module
//!
//! Everything a script-executor task needs to find and invoke its script.
//!
//! # Structure
//!
//! - [`module`]: The script contract and its single-use completion signal
//! - [`registry`]: Script definitions and lookup
//! - [`executable`]: Scripts backed by an external program
//! - [`builtin`]: Scripts shipped with the application

pub mod builtin;
pub mod executable;
pub mod module;
pub mod registry;

pub use executable::ExecutableScript;
pub use module::{
    Completion, FnScript, ScriptError, ScriptModule, ScriptOutcome, ScriptParams, ScriptResult,
};
pub use registry::{
    RegistryError, ScriptCatalog, ScriptDefinition, ScriptRegistry, DEFAULT_SCRIPT_ID,
};
