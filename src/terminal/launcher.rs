//! Terminal detection and command launching.
//!
//! # Example
//!
//! ```rust,no_run
//! use jarvis::terminal::{SystemTerminal, TerminalLauncher};
//!
//! let terminal = SystemTerminal::detect();
//! terminal.run_command(None, &["echo hi".to_string()]).unwrap();
//! ```

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;

/// Distinguishes script files written within the same millisecond.
static SCRIPT_COUNTER: AtomicUsize = AtomicUsize::new(0);

const GIT_BASH_PATHS: &[&str] = &[
    r"C:\Program Files\Git\bin\bash.exe",
    r"C:\Program Files (x86)\Git\bin\bash.exe",
];

/// Errors raised while launching a terminal.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("no terminal available on this platform")]
    UnsupportedPlatform,

    #[error("Terminal {0} not found")]
    UnknownTerminal(String),

    #[error("failed to write command script: {0}")]
    Io(#[from] io::Error),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Fire-and-forget command launcher consumed by the task runner.
pub trait TerminalLauncher: Send + Sync {
    /// Starts `commands` in the terminal named by `selector`, or the
    /// first available one. Returns once the terminal has been spawned.
    fn run_command(&self, selector: Option<&str>, commands: &[String]) -> Result<(), LaunchError>;

    /// Terminals this launcher can use.
    fn available_terminals(&self) -> Vec<TerminalProfile> {
        Vec::new()
    }
}

/// Operating system family, which decides script format and launch style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            "linux" => Platform::Linux,
            _ => Platform::Other,
        }
    }

    fn script_extension(self) -> &'static str {
        match self {
            Platform::Windows => "bat",
            _ => "sh",
        }
    }
}

/// A terminal emulator the launcher can start.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TerminalProfile {
    pub id: String,
    pub name: String,
    /// Executable, or application name on macOS
    pub program: String,
    /// Arguments placed before the script
    pub args: Vec<String>,
}

impl TerminalProfile {
    pub fn new(id: &str, name: &str, program: &str, args: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Launches commands in a terminal emulator installed on this machine.
pub struct SystemTerminal {
    platform: Platform,
    terminals: Vec<TerminalProfile>,
    script_dir: PathBuf,
}

impl SystemTerminal {
    /// Detects installed terminals for the current platform.
    pub fn detect() -> Self {
        let platform = Platform::current();
        let terminals = detect_terminals(platform);
        info!(
            "Detected {} terminal(s): {:?}",
            terminals.len(),
            terminals.iter().map(|t| t.id.as_str()).collect::<Vec<_>>()
        );
        Self::with_terminals(platform, terminals)
    }

    /// Uses an explicit terminal list.
    pub fn with_terminals(platform: Platform, terminals: Vec<TerminalProfile>) -> Self {
        Self {
            platform,
            terminals,
            script_dir: std::env::temp_dir().join("jarvis_scripts"),
        }
    }

    /// Sets the directory command scripts are written to.
    pub fn set_script_dir(&mut self, dir: impl Into<PathBuf>) {
        self.script_dir = dir.into();
    }

    /// Picks the terminal named by `selector`, or the first one.
    pub fn select(&self, selector: Option<&str>) -> Result<&TerminalProfile, LaunchError> {
        match selector {
            Some(id) => self
                .terminals
                .iter()
                .find(|t| t.id == id)
                .ok_or_else(|| LaunchError::UnknownTerminal(id.to_string())),
            None => self.terminals.first().ok_or(LaunchError::UnsupportedPlatform),
        }
    }

    /// Writes `commands` to a new script file and returns its path.
    ///
    /// The script keeps the terminal open until the user presses a key.
    pub fn create_script(&self, commands: &[String]) -> Result<PathBuf, LaunchError> {
        fs::create_dir_all(&self.script_dir)?;

        let script_path = self.script_dir.join(format!(
            "task_script_{}_{}.{}",
            Utc::now().timestamp_millis(),
            SCRIPT_COUNTER.fetch_add(1, Ordering::Relaxed),
            self.platform.script_extension()
        ));

        let mut file = File::create(&script_path)?;
        file.write_all(script_content(self.platform, commands).as_bytes())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755))?;
        }

        Ok(script_path)
    }

    /// Builds the process that opens `terminal` on `script`.
    pub fn build_command(&self, terminal: &TerminalProfile, script: &Path) -> Command {
        match self.platform {
            Platform::MacOs => {
                let apple_script = format!(
                    "tell application \"{}\"\n  activate\n  do script \"{}\"\nend tell",
                    terminal.program,
                    script.display()
                );
                let mut cmd = Command::new("osascript");
                cmd.arg("-e").arg(apple_script);
                cmd
            }
            Platform::Windows => {
                let mut cmd = Command::new(&terminal.program);
                cmd.args(&terminal.args).arg(script);
                cmd
            }
            Platform::Linux | Platform::Other => {
                let mut cmd = Command::new(&terminal.program);
                cmd.args(&terminal.args).arg("bash").arg(script);
                cmd
            }
        }
    }
}

impl TerminalLauncher for SystemTerminal {
    fn run_command(&self, selector: Option<&str>, commands: &[String]) -> Result<(), LaunchError> {
        let terminal = self.select(selector)?;
        let script = self.create_script(commands)?;
        debug!("Command script written to {}", script.display());

        let mut cmd = self.build_command(terminal, &script);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: terminal.program.clone(),
            source,
        })?;
        reap(child, terminal.name.clone());

        info!("Launched {} for {} command(s)", terminal.name, commands.len());
        Ok(())
    }

    fn available_terminals(&self) -> Vec<TerminalProfile> {
        self.terminals.clone()
    }
}

/// Waits for a launched terminal on a detached thread.
fn reap(mut child: Child, name: String) -> JoinHandle<Option<ExitStatus>> {
    thread::spawn(move || match child.wait() {
        Ok(status) => {
            debug!("{} exited with {}", name, status);
            Some(status)
        }
        Err(e) => {
            warn!("Could not wait for {}: {}", name, e);
            None
        }
    })
}

/// Renders the script text for a platform.
pub fn script_content(platform: Platform, commands: &[String]) -> String {
    match platform {
        Platform::Windows => format!("{}\r\npause", commands.join("\r\n")),
        _ => format!(
            "#!/bin/bash\n{}\necho\necho \"Press Enter to exit...\"\nread\n",
            commands.join("\n")
        ),
    }
}

fn on_path(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn detect_terminals(platform: Platform) -> Vec<TerminalProfile> {
    match platform {
        Platform::Windows => {
            let mut terminals = vec![
                TerminalProfile::new("cmd", "Command Prompt", "cmd.exe", &["/k"]),
                TerminalProfile::new("powershell", "PowerShell", "powershell.exe", &["-NoExit"]),
            ];
            if let Some(path) = GIT_BASH_PATHS.iter().find(|p| Path::new(p).exists()) {
                terminals.push(TerminalProfile::new("gitbash", "Git Bash", path, &["--login"]));
            }
            terminals
        }
        Platform::MacOs => vec![
            TerminalProfile::new("terminal", "Terminal", "Terminal", &[]),
            TerminalProfile::new("iterm", "iTerm", "iTerm", &[]),
        ],
        Platform::Linux => [
            TerminalProfile::new("gnome-terminal", "GNOME Terminal", "gnome-terminal", &["--"]),
            TerminalProfile::new("konsole", "Konsole", "konsole", &["-e"]),
            TerminalProfile::new("xfce4-terminal", "Xfce Terminal", "xfce4-terminal", &["-x"]),
            TerminalProfile::new("xterm", "XTerm", "xterm", &["-e"]),
        ]
        .into_iter()
        .filter(|t| on_path(&t.program))
        .collect(),
        Platform::Other => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn linux_terminal() -> SystemTerminal {
        SystemTerminal::with_terminals(
            Platform::Linux,
            vec![
                TerminalProfile::new("gnome-terminal", "GNOME Terminal", "gnome-terminal", &["--"]),
                TerminalProfile::new("xterm", "XTerm", "xterm", &["-e"]),
            ],
        )
    }

    #[cfg(unix)]
    #[test]
    fn test_reap_collects_exit_status() {
        let child = Command::new("true").spawn().unwrap();
        let status = reap(child, "true".to_string()).join().unwrap();
        assert!(status.unwrap().success());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_run_command_through_env() {
        let dir = tempdir().unwrap();
        let mut terminal = SystemTerminal::with_terminals(
            Platform::Linux,
            vec![TerminalProfile::new("env", "Env", "env", &[])],
        );
        terminal.set_script_dir(dir.path());

        terminal.run_command(Some("env"), &["true".to_string()]).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_script_content_unix() {
        let content = script_content(Platform::Linux, &["echo a".into(), "echo b".into()]);
        assert!(content.starts_with("#!/bin/bash\necho a\necho b\n"));
        assert!(content.contains("Press Enter to exit..."));
        assert!(content.trim_end().ends_with("read"));
    }

    #[test]
    fn test_script_content_windows() {
        let content = script_content(Platform::Windows, &["dir".into(), "echo hi".into()]);
        assert_eq!(content, "dir\r\necho hi\r\npause");
    }

    #[test]
    fn test_select() {
        let terminal = linux_terminal();
        assert_eq!(terminal.select(None).unwrap().id, "gnome-terminal");
        assert_eq!(terminal.select(Some("xterm")).unwrap().id, "xterm");

        let err = terminal.select(Some("alacritty")).unwrap_err();
        assert_eq!(err.to_string(), "Terminal alacritty not found");
    }

    #[test]
    fn test_no_terminals() {
        let terminal = SystemTerminal::with_terminals(Platform::Other, Vec::new());
        let result = terminal.run_command(None, &["echo hi".into()]);
        assert!(matches!(result, Err(LaunchError::UnsupportedPlatform)));
    }

    #[test]
    fn test_create_script_unique_and_executable() {
        let dir = tempdir().unwrap();
        let mut terminal = linux_terminal();
        terminal.set_script_dir(dir.path());

        let first = terminal.create_script(&["echo 1".into()]).unwrap();
        let second = terminal.create_script(&["echo 2".into()]).unwrap();

        assert_ne!(first, second);
        assert_eq!(first.extension().unwrap(), "sh");
        assert!(fs::read_to_string(&first).unwrap().contains("echo 1"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&first).unwrap().permissions().mode();
            assert_eq!(mode & 0o755, 0o755);
        }
    }

    #[test]
    fn test_build_command_linux() {
        let terminal = linux_terminal();
        let profile = terminal.select(Some("gnome-terminal")).unwrap();
        let cmd = terminal.build_command(profile, Path::new("/tmp/x.sh"));

        assert_eq!(cmd.get_program(), "gnome-terminal");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["--", "bash", "/tmp/x.sh"]);
    }

    #[test]
    fn test_build_command_macos() {
        let terminal = SystemTerminal::with_terminals(
            Platform::MacOs,
            vec![TerminalProfile::new("terminal", "Terminal", "Terminal", &[])],
        );
        let profile = terminal.select(None).unwrap();
        let cmd = terminal.build_command(profile, Path::new("/tmp/x.sh"));

        assert_eq!(cmd.get_program(), "osascript");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args[0], "-e");
        assert!(args[1].contains("tell application \"Terminal\""));
        assert!(args[1].contains("do script \"/tmp/x.sh\""));
    }

    #[test]
    fn test_spawn_failure() {
        let dir = tempdir().unwrap();
        let mut terminal = SystemTerminal::with_terminals(
            Platform::Linux,
            vec![TerminalProfile::new("ghost", "Ghost", "definitely-not-a-terminal-xyz", &[])],
        );
        terminal.set_script_dir(dir.path());

        let result = terminal.run_command(Some("ghost"), &["echo hi".into()]);
        assert!(matches!(result, Err(LaunchError::Spawn { .. })));
    }
}
