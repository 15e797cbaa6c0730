//! External command execution.
//!
//! Everything that talks to the OS (`dig`, `route`, `netstat`,
//! `networksetup`, `ifconfig`) goes through [`CommandRunner`] so the parsing
//! and decision logic can be tested against canned output.

use crate::error::{Result, SplitRouteError};
use std::process::Command;

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Human-readable exit status.
    pub status: String,
    /// Captured stdout, lossily decoded.
    pub stdout: String,
    /// Captured stderr, lossily decoded.
    pub stderr: String,
}

impl CommandOutput {
    /// A successful output with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            status: "exit status: 0".to_string(),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output with the given stderr.
    #[must_use]
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            status: "exit status: 1".to_string(),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Converts a non-zero exit into [`SplitRouteError::CommandFailed`].
    ///
    /// # Errors
    ///
    /// Returns [`SplitRouteError::CommandFailed`] if the command did not succeed.
    pub fn into_stdout(self, program: &str, args: &[&str]) -> Result<String> {
        if self.success {
            Ok(self.stdout)
        } else {
            Err(SplitRouteError::CommandFailed {
                command: command_line(program, args),
                status: self.status,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs external programs.
pub trait CommandRunner {
    /// Runs a read-only command.
    ///
    /// # Errors
    ///
    /// Returns [`SplitRouteError::Io`] if the program could not be spawned.
    /// A non-zero exit is reported through [`CommandOutput::success`].
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Runs a command that mutates system state and may need elevation.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    fn run_privileged(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        self.run(program, args)
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        (**self).run(program, args)
    }

    fn run_privileged(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        (**self).run_privileged(program, args)
    }
}

/// Runs commands with [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner {
    elevate: bool,
}

impl SystemRunner {
    /// Creates a runner that executes privileged commands as the current user.
    #[must_use]
    pub const fn new() -> Self {
        Self { elevate: false }
    }

    /// Routes privileged commands through `sudo -n`.
    ///
    /// `-n` never prompts; credentials must already be cached (see
    /// [`crate::keepalive`]).
    #[must_use]
    pub const fn with_sudo(mut self, elevate: bool) -> Self {
        self.elevate = elevate;
        self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        tracing::trace!(command = %command_line(program, args), "Running command");
        let output = Command::new(program).args(args).output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn run_privileged(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        if !self.elevate {
            return self.run(program, args);
        }
        let mut sudo_args = Vec::with_capacity(args.len() + 2);
        sudo_args.push("-n");
        sudo_args.push(program);
        sudo_args.extend_from_slice(args);
        self.run("sudo", &sudo_args)
    }
}

/// Joins a program and its arguments for display.
#[must_use]
pub fn command_line(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------
