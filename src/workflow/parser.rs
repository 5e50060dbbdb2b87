//! Workflow File Parser
//!
//! Loads workflows from YAML or JSON files. A file holds either a single
//! workflow or a list of them.

use std::error::Error;
use std::fs;

use log::{debug, info};
use serde::Deserialize;

use super::model::Workflow;
use super::validator::validate_workflow;

/// Accepted top-level shapes of a workflow file.
#[derive(Deserialize)]
#[serde(untagged)]
enum WorkflowFile {
    Many(Vec<Workflow>),
    Document { workflows: Vec<Workflow> },
    One(Workflow),
}

impl WorkflowFile {
    fn into_workflows(self) -> Vec<Workflow> {
        match self {
            WorkflowFile::Many(workflows) | WorkflowFile::Document { workflows } => workflows,
            WorkflowFile::One(workflow) => vec![workflow],
        }
    }
}

/// Parses and validates workflows from text.
///
/// YAML is a superset of JSON, so both formats are accepted.
pub fn parse_workflows(content: &str) -> Result<Vec<Workflow>, Box<dyn Error>> {
    let file: WorkflowFile = serde_yaml::from_str(content)
        .map_err(|e| format!("Failed to parse workflow file: {}. Check the file format.", e))?;

    let workflows = file.into_workflows();
    for workflow in &workflows {
        validate_workflow(workflow)?;
    }
    Ok(workflows)
}

/// Loads and validates workflows from a file.
///
/// # Example
///
/// ```rust,no_run
/// use jarvis::workflow::load_workflows;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workflows = load_workflows("deploy.yaml")?;
///     println!("Loaded {} workflows", workflows.len());
///     Ok(())
/// }
/// ```
pub fn load_workflows(path: &str) -> Result<Vec<Workflow>, Box<dyn Error>> {
    info!("Loading workflows from: {}", path);

    let content = fs::read_to_string(path).map_err(|e| {
        format!(
            "Failed to read workflow file '{}': {}. Check that the file exists and is readable.",
            path, e
        )
    })?;
    debug!("Workflow file loaded ({} bytes)", content.len());

    let workflows = parse_workflows(&content)?;
    info!("Parsed {} workflow(s)", workflows.len());
    Ok(workflows)
}
