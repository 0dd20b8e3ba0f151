// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process invocation.
//!
//! Gitpersona never links against git, OpenSSH, or GnuPG. It shells out to
//! whatever `git`, `ssh-keygen`, `ssh`, and `gpg` binaries are resolvable on
//! `PATH`. Exit status and the standard streams are the only contract with
//! those tools.
//!
//! All process launching goes through the [`Syscall`] trait so the logic
//! built on top of it can be exercised without spawning anything.

use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tracing::{debug, instrument};

/// Description of a process to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    stdin: Option<String>,
}

impl Invocation {
    /// Construct new invocation of program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            stdin: None,
        }
    }

    /// Append arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run process from within target directory.
    pub fn current_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(path.into());
        self
    }

    /// Feed text to process through standard input.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Name of program to run.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to program.
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Working directory of process, if any.
    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Standard input fed to process, if any.
    pub fn input(&self) -> Option<&str> {
        self.stdin.as_deref()
    }
}

impl Display for Invocation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.program)?;
        for arg in &self.args {
            write!(fmt, " {}", arg.to_string_lossy())?;
        }

        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Process exited with zero status.
    pub success: bool,

    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,
}

impl ProcessOutput {
    /// Successful output with given standard output.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with given standard error.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Standard error followed by standard output, trimmed.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stderr, self.stdout).trim().to_string()
    }
}

/// Layer of indirection for running external processes.
pub trait Syscall {
    /// Run process to completion, capturing its output.
    ///
    /// Only failure to launch the process is an error. A process that runs
    /// but exits with failure still yields [`ProcessOutput`].
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput>;

    /// Run process to completion, and require it to succeed.
    ///
    /// # Errors
    ///
    /// - Return [`SyscallError::Failed`] with the process' standard error if
    ///   it exits with failure.
    fn run_checked(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        let output = self.run(invocation)?;
        if !output.success {
            return Err(SyscallError::Failed {
                program: invocation.program().into(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(output)
    }
}

/// Run external processes through [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSyscall;

impl Syscall for SystemSyscall {
    #[instrument(skip(self, invocation), level = "debug")]
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        debug!("run {invocation}");
        let mut command = Command::new(invocation.program());
        command
            .args(invocation.arguments())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.input().is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        if let Some(dir) = invocation.working_dir() {
            command.current_dir(dir);
        }

        let launch_error = |err: std::io::Error| {
            if err.kind() == ErrorKind::NotFound {
                SyscallError::Missing {
                    program: invocation.program().into(),
                    source: err,
                }
            } else {
                SyscallError::Launch {
                    program: invocation.program().into(),
                    source: err,
                }
            }
        };

        let mut child = command.spawn().map_err(launch_error)?;
        if let (Some(input), Some(mut stdin)) = (invocation.input(), child.stdin.take()) {
            stdin
                .write_all(input.as_bytes())
                .map_err(|err| SyscallError::Launch {
                    program: invocation.program().into(),
                    source: err,
                })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|err| SyscallError::Launch {
                program: invocation.program().into(),
                source: err,
            })?;

        Ok(ProcessOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(output.stdout.as_slice()).into_owned(),
            stderr: String::from_utf8_lossy(output.stderr.as_slice()).into_owned(),
        })
    }
}

/// External process error types.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Program is not resolvable on `PATH`.
    #[error("{program:?} is not installed or not found on PATH")]
    Missing {
        #[source]
        source: std::io::Error,
        program: String,
    },

    /// Program could not be launched or waited on.
    #[error("failed to run {program:?}")]
    Launch {
        #[source]
        source: std::io::Error,
        program: String,
    },

    /// Program ran, but exited with failure.
    #[error("{program:?} failed: {stderr}")]
    Failed { program: String, stderr: String },
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;
