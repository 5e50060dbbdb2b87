//! Script Registry
//!
//! Maps script identifiers to their metadata and to an invocable
//! [`ScriptModule`]. The built-in catalog ships the standard scripts;
//! further definitions can be loaded from a YAML or JSON file and
//! either alias a registered handler or point at an executable file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::builtin;
use super::executable::ExecutableScript;
use super::module::ScriptModule;

/// Identifier used when a task names no script.
pub const DEFAULT_SCRIPT_ID: &str = "default";

/// Errors raised while looking up or loading a script.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("script file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("script path is not a file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("failed to read script definitions from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse script definitions from {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("duplicate script id: '{0}'")]
    DuplicateId(String),
}

/// Metadata describing a registered script.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDefinition {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Executable file, relative to the scripts directory unless absolute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Name of a registered handler (defaults to `id` when no path is set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,

    /// Program used to run `path`, e.g. `bash` or `python3`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,

    /// Parameter keys that must be present and non-empty
    #[serde(default)]
    pub required_params: Vec<String>,
}

impl ScriptDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            path: None,
            handler: None,
            interpreter: None,
            required_params: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_required(mut self, params: &[&str]) -> Self {
        self.required_params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }
}

/// Lookup and load service consumed by the task runner.
pub trait ScriptRegistry: Send + Sync {
    /// Returns the definition registered under `id`, if any.
    fn get_script_by_id(&self, id: &str) -> Result<Option<ScriptDefinition>, RegistryError>;

    /// Loads the module for a definition.
    ///
    /// `Ok(None)` means the definition exists but nothing invocable
    /// backs it.
    fn load(
        &self,
        definition: &ScriptDefinition,
    ) -> Result<Option<Arc<dyn ScriptModule>>, RegistryError>;

    /// Returns every registered definition.
    fn all_scripts(&self) -> Vec<ScriptDefinition>;

    /// Location reported in run results for a definition.
    fn script_path(&self, _definition: &ScriptDefinition) -> Option<PathBuf> {
        None
    }
}

/// In-memory script catalog.
///
/// # Example
///
/// ```
/// use jarvis::scripts::{ScriptCatalog, ScriptRegistry};
///
/// let catalog = ScriptCatalog::with_builtins("scripts");
/// let info = catalog.get_script_by_id("user-greeting").unwrap().unwrap();
/// assert_eq!(info.required_params, vec!["platform"]);
/// ```
pub struct ScriptCatalog {
    scripts_dir: PathBuf,
    definitions: Vec<ScriptDefinition>,
    handlers: HashMap<String, Arc<dyn ScriptModule>>,
}

impl ScriptCatalog {
    /// Creates an empty catalog.
    pub fn new(scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
            definitions: Vec::new(),
            handlers: HashMap::new(),
        }
    }

    /// Creates a catalog with the built-in scripts registered.
    pub fn with_builtins(scripts_dir: impl Into<PathBuf>) -> Self {
        let mut catalog = Self::new(scripts_dir);
        for (definition, handler) in builtin::builtin_scripts() {
            catalog.handlers.insert(definition.id.clone(), handler);
            catalog.definitions.push(definition);
        }
        catalog
    }

    /// Returns the directory relative script paths resolve against.
    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Registers a handler under `definition.id`.
    pub fn register(
        &mut self,
        definition: ScriptDefinition,
        handler: Arc<dyn ScriptModule>,
    ) -> Result<(), RegistryError> {
        let handler_name = definition
            .handler
            .clone()
            .unwrap_or_else(|| definition.id.clone());
        self.add_definition(definition)?;
        self.handlers.insert(handler_name, handler);
        Ok(())
    }

    /// Adds a definition without a handler of its own.
    pub fn add_definition(&mut self, definition: ScriptDefinition) -> Result<(), RegistryError> {
        if self.definitions.iter().any(|d| d.id == definition.id) {
            return Err(RegistryError::DuplicateId(definition.id));
        }
        debug!("Registered script '{}'", definition.id);
        self.definitions.push(definition);
        Ok(())
    }

    /// Loads extra definitions from a YAML or JSON list.
    ///
    /// ```yaml
    /// - id: backup
    ///   name: Backup database
    ///   path: backup.sh
    ///   interpreter: bash
    ///   requiredParams: [database]
    /// - id: hello
    ///   handler: user-greeting
    /// ```
    pub fn load_definitions(&mut self, path: &Path) -> Result<usize, RegistryError> {
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: display.clone(),
            source,
        })?;

        // YAML is a superset of JSON, so both formats parse here
        let definitions: Vec<ScriptDefinition> =
            serde_yaml::from_str(&content).map_err(|source| RegistryError::Parse {
                path: display.clone(),
                source,
            })?;

        let count = definitions.len();
        for definition in definitions {
            self.add_definition(definition)?;
        }

        info!("Loaded {} script definitions from {}", count, display);
        Ok(count)
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.scripts_dir.join(path)
        }
    }
}

impl ScriptRegistry for ScriptCatalog {
    fn get_script_by_id(&self, id: &str) -> Result<Option<ScriptDefinition>, RegistryError> {
        Ok(self.definitions.iter().find(|d| d.id == id).cloned())
    }

    fn load(
        &self,
        definition: &ScriptDefinition,
    ) -> Result<Option<Arc<dyn ScriptModule>>, RegistryError> {
        if let Some(path) = &definition.path {
            let resolved = self.resolve_path(path);
            if !resolved.exists() {
                return Err(RegistryError::MissingFile(resolved));
            }
            if !resolved.is_file() {
                return Err(RegistryError::NotAFile(resolved));
            }
            if definition.interpreter.is_none() && !is_executable(&resolved) {
                warn!(
                    "Script '{}' is not executable and has no interpreter: {}",
                    definition.id,
                    resolved.display()
                );
                return Ok(None);
            }
            let script = ExecutableScript::new(resolved, definition.interpreter.clone());
            return Ok(Some(Arc::new(script)));
        }

        let handler_name = definition.handler.as_deref().unwrap_or(&definition.id);
        Ok(self.handlers.get(handler_name).cloned())
    }

    fn all_scripts(&self) -> Vec<ScriptDefinition> {
        self.definitions.clone()
    }

    fn script_path(&self, definition: &ScriptDefinition) -> Option<PathBuf> {
        definition.path.as_deref().map(|p| self.resolve_path(p))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "exe" | "bat" | "cmd"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripts::{FnScript, ScriptResult};
    use tempfile::tempdir;

    #[test]
    fn test_builtins_registered() {
        let catalog = ScriptCatalog::with_builtins("scripts");
        let ids: Vec<_> = catalog.all_scripts().into_iter().map(|d| d.id).collect();

        for id in [DEFAULT_SCRIPT_ID, "system-info", "user-greeting", "file-operations", "data-transform"] {
            assert!(ids.contains(&id.to_string()), "missing builtin {}", id);
        }
    }

    #[test]
    fn test_unknown_id_is_none() {
        let catalog = ScriptCatalog::with_builtins("scripts");
        assert!(catalog.get_script_by_id("nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_builtin_loads() {
        let catalog = ScriptCatalog::with_builtins("scripts");
        let definition = catalog.get_script_by_id("system-info").unwrap().unwrap();
        assert!(catalog.load(&definition).unwrap().is_some());
        assert!(catalog.script_path(&definition).is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut catalog = ScriptCatalog::with_builtins("scripts");
        let result = catalog.add_definition(ScriptDefinition::new(DEFAULT_SCRIPT_ID, "Again"));
        assert!(matches!(result, Err(RegistryError::DuplicateId(_))));
    }

    #[test]
    fn test_register_custom_handler() {
        let mut catalog = ScriptCatalog::new("scripts");
        catalog
            .register(
                ScriptDefinition::new("echo", "Echo").with_required(&["text"]),
                Arc::new(FnScript::new(|_| Ok(ScriptResult::message("ok")))),
            )
            .unwrap();

        let definition = catalog.get_script_by_id("echo").unwrap().unwrap();
        assert_eq!(definition.required_params, vec!["text"]);
        assert!(catalog.load(&definition).unwrap().is_some());
    }

    #[test]
    fn test_definition_without_handler_not_invocable() {
        let mut catalog = ScriptCatalog::new("scripts");
        catalog
            .add_definition(ScriptDefinition::new("orphan", "Orphan").with_handler("missing"))
            .unwrap();

        let definition = catalog.get_script_by_id("orphan").unwrap().unwrap();
        assert!(catalog.load(&definition).unwrap().is_none());
    }

    #[test]
    fn test_missing_script_file() {
        let dir = tempdir().unwrap();
        let catalog = ScriptCatalog::new(dir.path());
        let definition = ScriptDefinition::new("gone", "Gone").with_path("gone.sh");

        let result = catalog.load(&definition);
        assert!(matches!(result, Err(RegistryError::MissingFile(_))));
    }

    #[test]
    fn test_directory_is_not_a_script() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let catalog = ScriptCatalog::new(dir.path());
        let definition = ScriptDefinition::new("sub", "Sub").with_path("sub");

        assert!(matches!(catalog.load(&definition), Err(RegistryError::NotAFile(_))));
    }

    #[test]
    fn test_interpreted_script_loads() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("run.sh"), "echo '{}'").unwrap();
        let catalog = ScriptCatalog::new(dir.path());
        let definition = ScriptDefinition::new("run", "Run")
            .with_path("run.sh")
            .with_interpreter("bash");

        assert!(catalog.load(&definition).unwrap().is_some());
        assert_eq!(catalog.script_path(&definition), Some(dir.path().join("run.sh")));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_without_interpreter() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("plain.txt"), "not a script").unwrap();
        let catalog = ScriptCatalog::new(dir.path());
        let definition = ScriptDefinition::new("plain", "Plain").with_path("plain.txt");

        assert!(catalog.load(&definition).unwrap().is_none());
    }

    #[test]
    fn test_load_definitions_yaml() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("scripts.yaml");
        std::fs::write(
            &file,
            "- id: hello\n  name: Hello\n  handler: user-greeting\n  requiredParams: [username]\n",
        )
        .unwrap();

        let mut catalog = ScriptCatalog::with_builtins(dir.path());
        assert_eq!(catalog.load_definitions(&file).unwrap(), 1);

        let definition = catalog.get_script_by_id("hello").unwrap().unwrap();
        assert_eq!(definition.required_params, vec!["username"]);
        assert!(catalog.load(&definition).unwrap().is_some());
    }

    #[test]
    fn test_load_definitions_json() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("scripts.json");
        std::fs::write(&file, r#"[{"id": "j", "path": "j.sh", "interpreter": "bash"}]"#).unwrap();

        let mut catalog = ScriptCatalog::new(dir.path());
        assert_eq!(catalog.load_definitions(&file).unwrap(), 1);
        assert_eq!(catalog.all_scripts()[0].interpreter.as_deref(), Some("bash"));
    }

    #[test]
    fn test_bundled_definitions() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("scripts");
        let mut catalog = ScriptCatalog::with_builtins(&dir);
        assert_eq!(catalog.load_definitions(&dir.join("scripts.yaml")).unwrap(), 2);

        let greet = catalog.get_script_by_id("greet").unwrap().unwrap();
        assert!(catalog.load(&greet).unwrap().is_some());

        let disk = catalog.get_script_by_id("disk-usage").unwrap().unwrap();
        assert_eq!(catalog.script_path(&disk), Some(dir.join("disk-usage.sh")));
    }

    #[test]
    fn test_load_definitions_bad_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.yaml");
        std::fs::write(&file, "id: [unterminated").unwrap();

        let mut catalog = ScriptCatalog::new(dir.path());
        assert!(matches!(catalog.load_definitions(&file), Err(RegistryError::Parse { .. })));
        assert!(matches!(
            catalog.load_definitions(&dir.path().join("missing.yaml")),
            Err(RegistryError::Io { .. })
        ));
    }
}
