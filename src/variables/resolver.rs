//! Variable Resolution
//!
//! Substitutes `${task-<id>.output.<path>}` references in task
//! parameters with values from the output cache.
//!
//! Resolution never fails: a reference that can't be resolved is left
//! in the value verbatim and reported in
//! [`ResolvedParameters::unresolved`].

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::execution::OutputCache;
use crate::workflow::{Parameter, Workflow};

use super::reference::{scan, value_to_text, MalformedReference, Token, VariableReference, REFERENCE_START};

/// Why a reference was left verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The expression is not a `task-<id>.output...` path
    Malformed(MalformedReference),
    /// The referenced task has no cached output in this workflow
    NoOutput { task_id: String },
    /// The path doesn't exist in the cached output
    PathNotFound { task_id: String },
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "malformed reference: {}", e),
            Self::NoOutput { task_id } => write!(f, "task '{}' has no output yet", task_id),
            Self::PathNotFound { task_id } => {
                write!(f, "path not found in output of task '{}'", task_id)
            }
        }
    }
}

/// A reference that was left unsubstituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    /// Parameter key the reference appeared in
    pub key: String,
    /// Reference text as written
    pub expression: String,
    pub reason: UnresolvedReason,
}

/// Result of resolving a task's parameter list.
#[derive(Debug, Clone, Default)]
pub struct ResolvedParameters {
    /// One entry per parameter key
    pub values: BTreeMap<String, String>,
    /// References that could not be substituted
    pub unresolved: Vec<UnresolvedReference>,
}

impl ResolvedParameters {
    /// Gets a resolved value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns true if the value under `key` still contains an
    /// unresolved reference.
    pub fn is_unresolved(&self, key: &str) -> bool {
        self.unresolved.iter().any(|u| u.key == key)
    }

    /// Consumes the result and returns the flat mapping.
    pub fn into_values(self) -> BTreeMap<String, String> {
        self.values
    }
}

/// Outcome of resolving one expression against a snapshot.
enum Lookup<'v> {
    Found(&'v Value),
    Missing(UnresolvedReason),
}

fn lookup<'v>(path: &str, outputs: &'v BTreeMap<String, Value>) -> Lookup<'v> {
    let reference = match VariableReference::parse(path) {
        Ok(r) => r,
        Err(e) => return Lookup::Missing(UnresolvedReason::Malformed(e)),
    };

    let Some(output) = outputs.get(&reference.task_id) else {
        return Lookup::Missing(UnresolvedReason::NoOutput {
            task_id: reference.task_id,
        });
    };

    match reference.lookup(output) {
        Some(value) => Lookup::Found(value),
        None => Lookup::Missing(UnresolvedReason::PathNotFound {
            task_id: reference.task_id,
        }),
    }
}

/// Resolves every parameter of a task.
///
/// Reads a single snapshot of the workflow's cached outputs, so the
/// result is deterministic for a given cache state.
///
/// # Example
///
/// ```
/// use jarvis::execution::OutputCache;
/// use jarvis::variables::resolve;
/// use jarvis::workflow::Parameter;
/// use serde_json::json;
///
/// let cache = OutputCache::new();
/// cache.record("w", "3", json!({"user": {"name": "Ada"}}));
///
/// let params = vec![Parameter::new("greeting", "Hello ${task-3.output.user.name}")];
/// let resolved = resolve(&params, "w", &cache);
/// assert_eq!(resolved.get("greeting"), Some("Hello Ada"));
/// ```
pub fn resolve(parameters: &[Parameter], workflow_id: &str, cache: &OutputCache) -> ResolvedParameters {
    let outputs = cache.workflow_outputs(workflow_id);
    let mut resolved = ResolvedParameters::default();

    for param in parameters {
        // Last write wins for duplicate keys
        resolved.unresolved.retain(|u| u.key != param.key);

        if !param.value.contains(REFERENCE_START) {
            resolved.values.insert(param.key.clone(), param.value.clone());
            continue;
        }

        let mut text = String::with_capacity(param.value.len());
        for token in scan(&param.value) {
            match token {
                Token::Literal(s) => text.push_str(s),
                Token::Expression { raw, path } => match lookup(path, &outputs) {
                    Lookup::Found(value) => text.push_str(&value_to_text(value)),
                    Lookup::Missing(reason) => {
                        debug!("Leaving {} unresolved in '{}': {}", raw, param.key, reason);
                        text.push_str(raw);
                        resolved.unresolved.push(UnresolvedReference {
                            key: param.key.clone(),
                            expression: raw.to_string(),
                            reason,
                        });
                    }
                },
            }
        }

        resolved.values.insert(param.key.clone(), text);
    }

    resolved
}

/// Renders a value the way it would resolve, marking failures inline.
///
/// References to tasks without output become `[${...} - No data]`,
/// missing paths `[${...} - Not found]`. Malformed expressions are
/// copied through.
pub fn preview(value: &str, workflow_id: &str, cache: &OutputCache) -> String {
    if !value.contains(REFERENCE_START) {
        return value.to_string();
    }

    let outputs = cache.workflow_outputs(workflow_id);
    scan(value)
        .into_iter()
        .map(|token| match token {
            Token::Literal(s) => s.to_string(),
            Token::Expression { raw, path } => match lookup(path, &outputs) {
                Lookup::Found(value) => value_to_text(value),
                Lookup::Missing(UnresolvedReason::NoOutput { .. }) => {
                    format!("[{} - No data]", raw)
                }
                Lookup::Missing(UnresolvedReason::PathNotFound { .. }) => {
                    format!("[{} - Not found]", raw)
                }
                Lookup::Missing(UnresolvedReason::Malformed(_)) => raw.to_string(),
            },
        })
        .collect()
}

/// A reference that can currently be resolved.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AvailableReference {
    pub task_id: String,
    pub task_name: String,
    /// Ready-to-use `${task-<id>.output.<path>}` text
    pub expression: String,
    pub value: Value,
}

/// Lists every leaf value in the cached outputs of the other tasks in
/// a workflow.
///
/// Tasks are listed in workflow order; within a task, object keys are
/// visited in their stored order and array items by index.
pub fn available_references(
    workflow: &Workflow,
    current_task_id: Option<&str>,
    cache: &OutputCache,
) -> Vec<AvailableReference> {
    let outputs = cache.workflow_outputs(&workflow.id);
    let mut seen = HashSet::new();
    let mut references = Vec::new();

    for task in &workflow.tasks {
        if Some(task.id.as_str()) == current_task_id || !seen.insert(task.id.as_str()) {
            continue;
        }
        let Some(output) = outputs.get(&task.id) else {
            continue;
        };

        let mut reference = VariableReference {
            task_id: task.id.clone(),
            segments: Vec::new(),
        };
        collect_leaves(output, &mut reference, &mut |reference, value| {
            references.push(AvailableReference {
                task_id: task.id.clone(),
                task_name: task.name.clone(),
                expression: reference.to_expression(),
                value: value.clone(),
            });
        });
    }

    references
}

fn collect_leaves(
    value: &Value,
    reference: &mut VariableReference,
    emit: &mut dyn FnMut(&VariableReference, &Value),
) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                reference.segments.push(key.clone());
                collect_leaves(child, reference, emit);
                reference.segments.pop();
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                reference.segments.push(index.to_string());
                collect_leaves(child, reference, emit);
                reference.segments.pop();
            }
        }
        leaf => emit(reference, leaf),
    }
}
