//! Terminal Launching
//!
//! Command tasks are not run by the engine itself. Their commands are
//! written to a temporary script and handed to a terminal emulator,
//! which the user watches. Nothing waits for the terminal to finish.

pub mod launcher;

pub use launcher::{LaunchError, Platform, SystemTerminal, TerminalLauncher, TerminalProfile};
