//! Variable References
//!
//! Parameter values may embed `${task-<id>.output.<path>}` references to
//! the cached output of another task in the same workflow.
//!
//! - [`reference`]: Scanning and parsing of reference expressions
//! - [`resolver`]: Substitution against the output cache, previews and
//!   the catalog of references a task can use

pub mod reference;
pub mod resolver;

pub use reference::VariableReference;
pub use resolver::{
    available_references, preview, resolve, AvailableReference, ResolvedParameters,
    UnresolvedReason, UnresolvedReference,
};
