//! Harness configuration (`liftcheck.toml`).
//!
//! Defines the typed configuration for the harness: which executables
//! to drive, how to recognize converter-internal branches, and the
//! inter-commit delay. Missing fields use defaults; a missing file
//! means all defaults (no error). Verbosity and retention come from
//! the command line, not the file, and are threaded through every
//! constructor via [`Settings`]; there is no global mutable state.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{HarnessError, Result};

// ---------------------------------------------------------------------------
// Verbosity
// ---------------------------------------------------------------------------

/// Diagnostic verbosity, accumulated from repeated `-v` flags.
///
/// The ladder matches what each level unlocks:
/// 1. step results (trees matched / diverged as expected)
/// 2. echo of every native command executed
/// 3. native client output unmuted (no `-Q` passed to cvs)
/// 4. and up: converter verbosity (`-v` per level above 3)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Verbosity(u8);

impl Verbosity {
    const STEPS: u8 = 1;
    const COMMANDS: u8 = 2;
    const NATIVE: u8 = 3;
    const CONVERTER: u8 = 4;

    /// Build from a `-v` occurrence count.
    pub const fn new(level: u8) -> Self {
        Self(level)
    }

    /// Report per-reference comparison results as they happen.
    pub const fn shows_steps(self) -> bool {
        self.0 >= Self::STEPS
    }

    /// Echo every native command before executing it.
    pub const fn shows_commands(self) -> bool {
        self.0 >= Self::COMMANDS
    }

    /// Let the native client write to the terminal (drop `-Q`).
    pub const fn shows_native(self) -> bool {
        self.0 >= Self::NATIVE
    }

    /// Number of `-v` flags to pass to the converter.
    pub const fn converter_flags(self) -> usize {
        if self.0 >= Self::CONVERTER {
            (self.0 - Self::CONVERTER + 1) as usize
        } else {
            0
        }
    }
}

// ---------------------------------------------------------------------------
// HarnessConfig
// ---------------------------------------------------------------------------

/// Top-level harness configuration, parsed from `liftcheck.toml`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// External executables to drive.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Synthetic-branch recognition.
    #[serde(default)]
    pub filter: FilterConfig,

    /// External timing constraints.
    #[serde(default)]
    pub timing: TimingConfig,
}

impl HarnessConfig {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| HarnessError::Config {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| HarnessError::Config {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Load `liftcheck.toml` from `dir` if present, defaults otherwise.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join("liftcheck.toml");
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}

// ---------------------------------------------------------------------------
// ToolsConfig
// ---------------------------------------------------------------------------

/// Names (or paths) of the external executables.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// The legacy version-control client.
    #[serde(default = "default_cvs")]
    pub cvs: String,

    /// The target version-control client.
    #[serde(default = "default_git")]
    pub git: String,

    /// The history-conversion executable.
    #[serde(default = "default_converter")]
    pub converter: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            cvs: default_cvs(),
            git: default_git(),
            converter: default_converter(),
        }
    }
}

fn default_cvs() -> String {
    "cvs".to_owned()
}

fn default_git() -> String {
    "git".to_owned()
}

fn default_converter() -> String {
    "cvs-fast-export".to_owned()
}

// ---------------------------------------------------------------------------
// FilterConfig
// ---------------------------------------------------------------------------

/// Recognition of converter-internal bookkeeping branches.
///
/// The converter fabricates branches for unnamed and vendor-import
/// history segments. Its naming scheme is an external, evolving
/// interface, so the filter is configuration rather than a constant.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// A branch whose name starts with any of these is synthetic.
    #[serde(default = "default_synthetic_prefixes")]
    pub synthetic_prefixes: Vec<String>,

    /// A branch whose name contains any of these is synthetic.
    #[serde(default = "default_synthetic_tokens")]
    pub synthetic_tokens: Vec<String>,
}

impl FilterConfig {
    /// Whether a branch name denotes converter-internal bookkeeping.
    pub fn is_synthetic(&self, branch: &str) -> bool {
        self.synthetic_prefixes
            .iter()
            .any(|p| branch.starts_with(p.as_str()))
            || self
                .synthetic_tokens
                .iter()
                .any(|t| branch.contains(t.as_str()))
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            synthetic_prefixes: default_synthetic_prefixes(),
            synthetic_tokens: default_synthetic_tokens(),
        }
    }
}

fn default_synthetic_prefixes() -> Vec<String> {
    vec!["import-".to_owned()]
}

fn default_synthetic_tokens() -> Vec<String> {
    vec!["UNNAMED".to_owned()]
}

// ---------------------------------------------------------------------------
// TimingConfig
// ---------------------------------------------------------------------------

/// External timing constraints.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    /// Minimum delay before each commit, in milliseconds.
    ///
    /// CVS commit timestamps have one-second granularity; back-to-back
    /// commits can collide or be misordered by downstream history
    /// reconstruction. This is a correctness requirement, not tuning.
    #[serde(default = "default_commit_delay_ms")]
    pub commit_delay_ms: u64,
}

impl TimingConfig {
    /// The inter-commit delay as a [`Duration`].
    pub const fn commit_delay(&self) -> Duration {
        Duration::from_millis(self.commit_delay_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            commit_delay_ms: default_commit_delay_ms(),
        }
    }
}

const fn default_commit_delay_ms() -> u64 {
    1000
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Everything a driver needs to know about the current run: the file
/// configuration plus the command-line verbosity and retention flags.
/// Cloned into each handle; cheap (a few strings).
#[derive(Clone, Debug, Default)]
pub struct Settings {
    /// Parsed `liftcheck.toml` (or defaults).
    pub config: HarnessConfig,

    /// Accumulated `-v` level.
    pub verbosity: Verbosity,

    /// Keep scratch directories and stream files after the run.
    pub retain: bool,
}
