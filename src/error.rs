//! Error types for harness operations.
//!
//! [`HarnessError`] is the single error type returned by the driver,
//! checkout and comparator layers. Every variant is fatal for the
//! running scenario: it unwinds to the scenario runner, which cleans up
//! the scratch directory and exits non-zero. Assertion failures (tree
//! divergence, missing references, output mismatches) are *not* errors;
//! they are reported and returned as `Ok(false)` by the comparator.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by harness operations.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A native command exited with a non-zero status.
    #[error("`{command}` exited with code {code}")]
    CommandFailed {
        /// Rendered argv of the failed command.
        command: String,
        /// The process exit code.
        code: i32,
    },

    /// A native command was terminated by a signal. Reported distinctly
    /// from a plain non-zero exit: the tool did not get to decide its
    /// own status.
    #[error("`{command}` was terminated by signal {signal}")]
    CommandSignaled {
        /// Rendered argv of the killed command.
        command: String,
        /// The terminating signal number.
        signal: i32,
    },

    /// Output capture failed. There is no sensible default output for a
    /// failed capture, so this is always fatal.
    #[error("could not capture output of `{command}`: {detail}")]
    CaptureFailed {
        /// Rendered argv of the command.
        command: String,
        /// Exit status or spawn failure description.
        detail: String,
    },

    /// A configuration file could not be read or parsed.
    #[error("configuration error in `{}`: {detail}", path.display())]
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// What went wrong.
        detail: String,
    },

    /// A command could not be started at all (missing executable,
    /// permissions).
    #[error("could not execute `{command}`: {source}")]
    Spawn {
        /// Rendered argv of the command.
        command: String,
        /// The underlying spawn failure.
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred (file system access).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_command_failed() {
        let err = HarnessError::CommandFailed {
            command: "cvs -Q -d:local:/tmp/repo init".to_owned(),
            code: 1,
        };
        let msg = format!("{err}");
        assert!(msg.contains("cvs -Q"));
        assert!(msg.contains("code 1"));
    }

    #[test]
    fn display_command_signaled() {
        let err = HarnessError::CommandSignaled {
            command: "cvs-fast-export".to_owned(),
            signal: 9,
        };
        let msg = format!("{err}");
        assert!(msg.contains("signal 9"));
    }

    #[test]
    fn display_config() {
        let err = HarnessError::Config {
            path: PathBuf::from("liftcheck.toml"),
            detail: "unknown field `foo`".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("liftcheck.toml"));
        assert!(msg.contains("unknown field"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::other("disk full");
        let err: HarnessError = io.into();
        assert!(matches!(err, HarnessError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
