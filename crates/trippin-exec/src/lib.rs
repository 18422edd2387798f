//! Process execution adapter shared by harness tooling.
//!
//! This crate is the seam between the harness and the operating system: it
//! spawns the compiler, the builder and the produced test binaries, waits for
//! them, and reports a numeric exit status. Standard streams are inherited so
//! compiler diagnostics and test output reach the operator as they happen.

#![forbid(unsafe_code)]

use std::fmt;
use std::process::Command;

use thiserror::Error;

/// Status reported when a program could not be started at all.
///
/// Mirrors the shell's "command not found" convention.
pub const SPAWN_FAILURE_CODE: i32 = 127;

/// Offset added to a terminating signal number on unix, as shells do.
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// Numeric completion status of a child process. Zero means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitStatus(i32);

impl ExitStatus {
    /// The successful status.
    pub const SUCCESS: Self = Self(0);
    /// The status used when the program could not be spawned.
    pub const SPAWN_FAILURE: Self = Self(SPAWN_FAILURE_CODE);

    /// Wrap a raw exit code.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        Self(code)
    }

    /// Raw exit code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Whether the process exited with status zero.
    #[must_use]
    pub const fn success(self) -> bool {
        self.0 == 0
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self(SIGNAL_EXIT_BASE + signal);
            }
        }
        Self(1)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A program plus its argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
}

impl Invocation {
    /// Create an invocation with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Split a pre-joined command line on ASCII whitespace.
    ///
    /// Returns `None` for a blank command line. No shell quoting is applied.
    #[must_use]
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut words = command_line.split_ascii_whitespace();
        let program = words.next()?;
        Some(Self::new(program).args(words))
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

    /// Program name or path.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments, in order.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// The program could not be started.
#[derive(Debug, Error)]
#[error("failed to spawn `{program}`: {source}")]
pub struct SpawnError {
    pub program: String,
    #[source]
    pub source: std::io::Error,
}

/// Runs external programs to completion.
///
/// One attempt per call; interpreting the status is the caller's business.
pub trait ProcessRunner: Sync {
    /// Spawn `invocation`, block until it exits, and return its status.
    fn run(&self, invocation: &Invocation) -> Result<ExitStatus, SpawnError>;
}

/// [`ProcessRunner`] backed by [`std::process::Command`]. Children run in the
/// current working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<ExitStatus, SpawnError> {
        let mut command = Command::new(invocation.program());
        command.args(invocation.arguments());
        command
            .status()
            .map(ExitStatus::from)
            .map_err(|source| SpawnError {
                program: invocation.program().to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_whitespace() {
        let inv = Invocation::parse("  ninja -C  build\tall ").unwrap();
        assert_eq!(inv.program(), "ninja");
        assert_eq!(inv.arguments(), ["-C", "build", "all"]);
        assert_eq!(inv.to_string(), "ninja -C build all");
    }

    #[test]
    fn parse_rejects_blank_command() {
        assert!(Invocation::parse("").is_none());
        assert!(Invocation::parse(" \t ").is_none());
    }

    #[test]
    fn exit_status_success_is_zero_only() {
        assert!(ExitStatus::SUCCESS.success());
        assert!(!ExitStatus::from_code(1).success());
        assert!(!ExitStatus::from_code(-1).success());
        assert_eq!(ExitStatus::SPAWN_FAILURE.code(), 127);
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_reports_exit_code() {
        let runner = SystemRunner::new();
        let inv = Invocation::new("sh").arg("-c").arg("exit 3");
        assert_eq!(runner.run(&inv).unwrap(), ExitStatus::from_code(3));

        let ok = Invocation::new("sh").arg("-c").arg("exit 0");
        assert!(runner.run(&ok).unwrap().success());
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_maps_signals_above_128() {
        let runner = SystemRunner::new();
        let inv = Invocation::new("sh").arg("-c").arg("kill -9 $$");
        assert_eq!(runner.run(&inv).unwrap().code(), SIGNAL_EXIT_BASE + 9);
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let runner = SystemRunner::new();
        let inv = Invocation::new("/nonexistent/trippin-exec-test-binary");
        let err = runner.run(&inv).unwrap_err();
        assert_eq!(err.program, "/nonexistent/trippin-exec-test-binary");
        assert!(err.to_string().contains("failed to spawn"));
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
    }
}
