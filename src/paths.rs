//! Data Locations
//!
//! Default file locations, resolved once per process.
//!
//! # Scripts Directory Resolution Priority
//!
//! 1. `JARVIS_SCRIPTS_DIR` environment variable
//! 2. Production path: `scripts/` next to the jarvis executable
//! 3. Development path: `{project_root}/scripts`
//! 4. `~/.jarvis/scripts`

use std::path::PathBuf;

use log::info;
use once_cell::sync::Lazy;

/// Per-user application directory (`~/.jarvis`).
pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".jarvis")
});

/// Workflow store file, overridable with `JARVIS_STORE`.
pub static STORE_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(path) = std::env::var("JARVIS_STORE") {
        info!("Using workflow store from JARVIS_STORE: {}", path);
        return PathBuf::from(path);
    }
    DATA_DIR.join("workflows.json")
});

/// Directory that relative script paths resolve against.
pub static SCRIPTS_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(dir) = std::env::var("JARVIS_SCRIPTS_DIR") {
        info!("Using scripts directory from JARVIS_SCRIPTS_DIR: {}", dir);
        return PathBuf::from(dir);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let prod_path = exe_dir.join("scripts");
            if prod_path.is_dir() {
                info!("Using production scripts directory: {}", prod_path.display());
                return prod_path;
            }
        }
    }

    let dev_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scripts");
    if dev_path.is_dir() {
        info!("Using development scripts directory: {}", dev_path.display());
        return dev_path;
    }

    DATA_DIR.join("scripts")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_name() {
        assert!(DATA_DIR.ends_with(".jarvis"));
    }

    #[test]
    fn test_store_path_is_file_path() {
        assert!(STORE_PATH.file_name().is_some());
    }
}
