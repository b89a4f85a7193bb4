//! Shared helpers for liftcheck integration tests.
//!
//! All tests run in temp directories, with no side effects outside them.
//! End-to-end tests skip gracefully when the external tools (cvs, git,
//! cvs-fast-export) are not installed.

use std::process::{Command, Stdio};

use liftcheck::config::Settings;

/// Whether an executable is present and answers `--version`.
pub fn tool_available(name: &str) -> bool {
    Command::new(name)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Whether the full toolchain a conversion needs is present.
pub fn conversion_tools_available() -> bool {
    let settings = Settings::default();
    let tools = &settings.config.tools;
    tool_available(&tools.cvs) && tool_available(&tools.git) && tool_available(&tools.converter)
}

/// Default settings for test runs.
pub fn settings() -> Settings {
    Settings::default()
}
