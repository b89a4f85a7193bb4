//! Native command execution.
//!
//! Commands are built as structured argument lists ([`NativeCommand`]),
//! never interpolated shell strings, and always carry their working
//! directory explicitly; nothing in the harness changes the process
//! cwd. The [`CommandRunner`] trait is the seam between the harness and
//! the external tools; [`ShellRunner`] is the real implementation and
//! the tests drive the drivers with a scripted fake.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::error::{HarnessError, Result};

// ---------------------------------------------------------------------------
// NativeCommand
// ---------------------------------------------------------------------------

/// Where a command's standard input comes from.
#[derive(Clone, Debug)]
pub enum StdinSource {
    /// Feed the given bytes.
    Bytes(Vec<u8>),
    /// Connect to the given file.
    File(PathBuf),
}

/// A command to execute: program, argument list, working directory and
/// optional stream redirections.
#[derive(Clone, Debug)]
pub struct NativeCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    stdin: Option<StdinSource>,
    stdout_to: Option<PathBuf>,
}

impl NativeCommand {
    /// Start building a command for `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
            stdout_to: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run with the given working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Feed the given bytes on standard input.
    #[must_use]
    pub fn stdin_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(StdinSource::Bytes(bytes.into()));
        self
    }

    /// Connect standard input to a file.
    #[must_use]
    pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(StdinSource::File(path.into()));
        self
    }

    /// Redirect standard output to a file (created/truncated).
    #[must_use]
    pub fn stdout_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_to = Some(path.into());
        self
    }

    /// The working directory, if one was set.
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }
}

/// Renders the argv for diagnostics. Arguments containing whitespace
/// are single-quoted so the echo is readable; this string is never
/// handed to a shell.
impl fmt::Display for NativeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) || arg.is_empty() {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

/// How a child process ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// Exited on its own with the given code.
    Exited(i32),
    /// Terminated by the given signal, a harder failure class than a
    /// non-zero exit, reported distinctly, but callers still decide
    /// whether to abort.
    Signaled(i32),
}

impl RunStatus {
    /// Whether the command completed with exit status zero.
    pub const fn success(self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Turn a failed status into the matching fatal error.
    pub fn check(self, command: &NativeCommand) -> Result<()> {
        match self {
            Self::Exited(0) => Ok(()),
            Self::Exited(code) => Err(HarnessError::CommandFailed {
                command: command.to_string(),
                code,
            }),
            Self::Signaled(signal) => Err(HarnessError::CommandSignaled {
                command: command.to_string(),
                signal,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

/// Executes native commands. The trait boundary exists so the drivers
/// can be exercised with a scripted fake instead of real executables.
pub trait CommandRunner {
    /// Execute a command, inheriting the harness's stdout/stderr.
    ///
    /// Returns the child's [`RunStatus`]; only a failure to start the
    /// process at all is an `Err`.
    fn run(&self, command: &NativeCommand) -> Result<RunStatus>;

    /// Execute a command and return its captured standard output.
    ///
    /// Any failure (spawn, non-zero exit, signal) is an `Err`: there
    /// is no sensible default output for a failed capture.
    fn capture(&self, command: &NativeCommand) -> Result<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// ShellRunner
// ---------------------------------------------------------------------------

/// The real [`CommandRunner`], backed by [`std::process::Command`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ShellRunner;

impl ShellRunner {
    fn prepare(command: &NativeCommand) -> Result<Command> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }
        match &command.stdin {
            Some(StdinSource::Bytes(_)) => {
                cmd.stdin(Stdio::piped());
            }
            Some(StdinSource::File(path)) => {
                let file = std::fs::File::open(path)?;
                cmd.stdin(Stdio::from(file));
            }
            None => {
                cmd.stdin(Stdio::null());
            }
        }
        if let Some(path) = &command.stdout_to {
            let file = std::fs::File::create(path)?;
            cmd.stdout(Stdio::from(file));
        }
        Ok(cmd)
    }

    fn spawn_err(command: &NativeCommand, source: std::io::Error) -> HarnessError {
        HarnessError::Spawn {
            command: command.to_string(),
            source,
        }
    }

    fn feed_stdin(child: &mut std::process::Child, command: &NativeCommand) -> Result<()> {
        if let Some(StdinSource::Bytes(bytes)) = &command.stdin {
            // take() closes the pipe when the handle drops, signalling EOF
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(bytes)?;
            }
        }
        Ok(())
    }
}

fn status_of(status: std::process::ExitStatus) -> RunStatus {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return RunStatus::Signaled(signal);
        }
    }
    RunStatus::Exited(status.code().unwrap_or(-1))
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &NativeCommand) -> Result<RunStatus> {
        debug!(target: "liftcheck::exec", "executing `{command}`");
        let mut child = Self::prepare(command)?
            .spawn()
            .map_err(|e| Self::spawn_err(command, e))?;
        Self::feed_stdin(&mut child, command)?;
        let status = status_of(child.wait()?);
        if let RunStatus::Signaled(signal) = status {
            warn!(target: "liftcheck::exec", "`{command}` was terminated by signal {signal}");
        }
        Ok(status)
    }

    fn capture(&self, command: &NativeCommand) -> Result<Vec<u8>> {
        debug!(target: "liftcheck::exec", "capturing `{command}`");
        let mut cmd = Self::prepare(command)?;
        cmd.stdout(Stdio::piped());
        let mut child = cmd.spawn().map_err(|e| Self::spawn_err(command, e))?;
        Self::feed_stdin(&mut child, command)?;
        let output = child.wait_with_output()?;
        let status = status_of(output.status);
        if status.success() {
            Ok(output.stdout)
        } else {
            let detail = match status {
                RunStatus::Exited(code) => format!("exited with code {code}"),
                RunStatus::Signaled(signal) => format!("terminated by signal {signal}"),
            };
            Err(HarnessError::CaptureFailed {
                command: command.to_string(),
                detail,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Scripted runner for unit tests
// ---------------------------------------------------------------------------
