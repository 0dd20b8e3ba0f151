// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command gateway.
//!
//! Thin wrappers around the handful of `git`, `ssh`, `ssh-keygen`, and `gpg`
//! invocations gitpersona needs. Each wrapper runs a fixed argument vector,
//! and maps the outcome to a result. Nothing here retries.
//!
//! # Git Configuration Keys
//!
//! Only the following keys are ever touched:
//!
//! - `user.name` and `user.email` at global or local scope.
//! - `user.signingkey` and `commit.gpgsign` at global scope.
//! - `core.sshCommand` at local scope.
//! - `credential.helper` at global scope, read only.

pub mod keygen;

use crate::syscall::{Invocation, Syscall, SyscallError, SystemSyscall};

use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Current global git user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitUser {
    pub name: String,
    pub email: String,
}

/// Gateway to external tools.
#[derive(Debug, Default, Clone)]
pub struct Gateway<S = SystemSyscall>
where
    S: Syscall,
{
    syscall: S,
}

impl<S> Gateway<S>
where
    S: Syscall,
{
    /// Construct new gateway.
    pub fn new(syscall: S) -> Self {
        Self { syscall }
    }

    /// Access underlying process runner.
    pub fn syscall(&self) -> &S {
        &self.syscall
    }

    /// Make identity the machine-wide git default.
    ///
    /// Sets global `user.name` and `user.email`. With a GPG key id, also sets
    /// `user.signingkey` and turns on `commit.gpgsign`. Without one, unsets
    /// `user.signingkey` and turns off `commit.gpgsign` on a best-effort basis,
    /// since the key was most likely never set to begin with.
    ///
    /// # Errors
    ///
    /// - Return [`GatewayError::Syscall`] if git cannot be run, or fails to
    ///   set name, email, or signing key.
    #[instrument(skip(self, name, email, gpg_key_id), level = "debug")]
    pub fn set_global_identity(
        &self,
        name: &str,
        email: &str,
        gpg_key_id: Option<&str>,
    ) -> Result<()> {
        self.git_config(None, ["--global", "user.name", name])?;
        self.git_config(None, ["--global", "user.email", email])?;

        match gpg_key_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => {
                self.git_config(None, ["--global", "user.signingkey", id])?;
                self.git_config(None, ["--global", "commit.gpgsign", "true"])?;
            }
            None => {
                for args in [
                    ["--global", "--unset", "user.signingkey"],
                    ["--global", "commit.gpgsign", "false"],
                ] {
                    if let Err(err) = self.git_config(None, args) {
                        debug!("ignoring failure to clear signing setup: {err}");
                    }
                }
            }
        }
        info!("global git identity is now {name} <{email}>");

        Ok(())
    }

    /// Pin repository to identity.
    ///
    /// Sets local `user.name`, `user.email`, and a `core.sshCommand` that
    /// always uses the given key regardless of the SSH client configuration.
    ///
    /// # Errors
    ///
    /// - Return [`GatewayError::NotARepository`] without running anything if
    ///   path has no `.git` entry.
    /// - Return [`GatewayError::Syscall`] if git cannot be run, or fails.
    #[instrument(skip(self, repo_path, name, email, ssh_key_path), level = "debug")]
    pub fn set_local_identity(
        &self,
        repo_path: &Path,
        name: &str,
        email: &str,
        ssh_key_path: &Path,
    ) -> Result<()> {
        if !is_repository(repo_path) {
            return Err(GatewayError::NotARepository {
                path: repo_path.into(),
            });
        }

        let ssh_command = ssh_command(ssh_key_path);
        self.git_config(Some(repo_path), ["--local", "user.name", name])?;
        self.git_config(Some(repo_path), ["--local", "user.email", email])?;
        self.git_config(Some(repo_path), ["--local", "core.sshCommand", ssh_command.as_str()])?;
        info!(
            "local git identity of {:?} is now {name} <{email}>",
            repo_path.display()
        );

        Ok(())
    }

    /// Read current global `user.name` and `user.email`.
    ///
    /// Yields nothing unless both are set.
    ///
    /// # Errors
    ///
    /// - Return [`GatewayError::Syscall`] if git cannot be run.
    pub fn current_global_user(&self) -> Result<Option<GitUser>> {
        let name = self.git_config_get(["--global", "user.name"])?;
        let email = self.git_config_get(["--global", "user.email"])?;

        Ok(name.zip(email).map(|(name, email)| GitUser { name, email }))
    }

    /// Read global `credential.helper`.
    ///
    /// A configured helper hints that the user authenticates over HTTPS
    /// rather than SSH.
    ///
    /// # Errors
    ///
    /// - Return [`GatewayError::Syscall`] if git cannot be run.
    pub fn credential_helper(&self) -> Result<Option<String>> {
        self.git_config_get(["--global", "credential.helper"])
    }

    /// Probe SSH authentication against host.
    ///
    /// Returns standard error followed by standard output. The exit status is
    /// ignored, because the service exits with failure even after a successful
    /// authentication. Use [`is_authenticated`] on the greeting instead.
    ///
    /// # Errors
    ///
    /// - Return [`GatewayError::Syscall`] if ssh cannot be run.
    #[instrument(skip(self), level = "debug")]
    pub fn test_connection(&self, host: &str) -> Result<String> {
        let output = self
            .syscall
            .run(&Invocation::new("ssh").args(["-T".to_string(), format!("git@{host}")]))?;
        let greeting = output.combined();
        debug!("ssh greeting: {greeting}");

        Ok(greeting)
    }

    fn git_config<'a>(
        &self,
        repo_path: Option<&Path>,
        args: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        let mut invocation = Invocation::new("git").args(["config"]).args(args);
        if let Some(path) = repo_path {
            invocation = invocation.current_dir(path);
        }
        self.syscall.run_checked(&invocation)?;

        Ok(())
    }

    fn git_config_get<'a>(
        &self,
        args: impl IntoIterator<Item = &'a str>,
    ) -> Result<Option<String>> {
        let invocation = Invocation::new("git").args(["config"]).args(args);
        let output = self.syscall.run(&invocation)?;
        if !output.success {
            // INVARIANT: Git exits with failure when key is not set.
            return Ok(None);
        }

        let value = output.stdout.trim();
        if value.is_empty() {
            warn!("{invocation} yielded an empty value");
            return Ok(None);
        }

        Ok(Some(value.to_string()))
    }
}

/// Check if path contains a `.git` entry.
pub fn is_repository(path: impl AsRef<Path>) -> bool {
    path.as_ref().join(".git").exists()
}

/// Build `core.sshCommand` value that pins a repository to one key.
///
/// Ignores the SSH client configuration entirely via `-F /dev/null`.
pub fn ssh_command(ssh_key_path: &Path) -> String {
    let key = ssh_key_path.to_string_lossy().replace('\\', "/");
    format!("ssh -i \"{key}\" -o IdentitiesOnly=yes -F /dev/null")
}

/// Check if connection probe greeting reports a successful authentication.
pub fn is_authenticated(greeting: &str) -> bool {
    greeting.contains("successfully authenticated")
}

/// External command gateway error types.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Target path is not a git working directory.
    #[error("not a valid git repository (no .git entry) at {:?}", path.display())]
    NotARepository { path: PathBuf },

    /// External tool cannot be run, or fails.
    #[error(transparent)]
    Syscall(#[from] SyscallError),
}

/// Friendly result alias :3
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::{
        testing::{Reply, ScriptedSyscall},
        ProcessOutput,
    };
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[test]
    fn global_identity_with_signing_key() -> anyhow::Result<()> {
        let gateway = Gateway::new(ScriptedSyscall::default());
        gateway.set_global_identity("John Doe", "john@doe.com", Some(" 1234ABCD "))?;

        let expect = vec![
            "git config --global user.name John Doe",
            "git config --global user.email john@doe.com",
            "git config --global user.signingkey 1234ABCD",
            "git config --global commit.gpgsign true",
        ];
        assert_eq!(gateway.syscall().command_lines(), expect);

        Ok(())
    }

    #[test]
    fn global_identity_swallows_unset_failures() -> anyhow::Result<()> {
        let gateway = Gateway::new(ScriptedSyscall::new([
            Reply::Output(ProcessOutput::ok("")),
            Reply::Output(ProcessOutput::ok("")),
            Reply::Output(ProcessOutput::failed("")),
            Reply::Output(ProcessOutput::failed("")),
        ]));
        gateway.set_global_identity("John Doe", "john@doe.com", Some("   "))?;

        let expect = vec![
            "git config --global user.name John Doe",
            "git config --global user.email john@doe.com",
            "git config --global --unset user.signingkey",
            "git config --global commit.gpgsign false",
        ];
        assert_eq!(gateway.syscall().command_lines(), expect);

        Ok(())
    }

    #[test]
    fn global_identity_stops_at_first_failure() {
        let gateway = Gateway::new(ScriptedSyscall::new([Reply::Output(
            ProcessOutput::failed("error: could not lock config file"),
        )]));

        let result = gateway.set_global_identity("John Doe", "john@doe.com", None);

        assert!(matches!(
            result,
            Err(GatewayError::Syscall(SyscallError::Failed { .. }))
        ));
        assert_eq!(gateway.syscall().calls().len(), 1);
    }

    #[sealed_test]
    fn local_identity_pins_ssh_command() -> anyhow::Result<()> {
        std::fs::create_dir_all("repo/.git")?;
        let gateway = Gateway::new(ScriptedSyscall::default());
        gateway.set_local_identity(
            Path::new("repo"),
            "John Doe",
            "john@doe.com",
            Path::new("C:\\Users\\john\\.ssh\\id_work"),
        )?;

        let calls = gateway.syscall().calls();
        assert_eq!(calls.len(), 3);
        assert!(calls
            .iter()
            .all(|call| call.working_dir() == Some(Path::new("repo"))));
        assert_eq!(
            calls[2]
                .arguments()
                .last()
                .map(|arg| arg.to_string_lossy().into_owned()),
            Some(
                "ssh -i \"C:/Users/john/.ssh/id_work\" -o IdentitiesOnly=yes -F /dev/null"
                    .to_string()
            )
        );

        Ok(())
    }

    #[sealed_test]
    fn local_identity_requires_repository() {
        let gateway = Gateway::new(ScriptedSyscall::default());
        let result = gateway.set_local_identity(
            Path::new("."),
            "John Doe",
            "john@doe.com",
            Path::new("id_work"),
        );

        assert!(matches!(result, Err(GatewayError::NotARepository { .. })));
        assert!(gateway.syscall().calls().is_empty());
    }

    #[test]
    fn current_global_user_needs_name_and_email() -> anyhow::Result<()> {
        let gateway = Gateway::new(ScriptedSyscall::new([
            Reply::Output(ProcessOutput::ok("John Doe\n")),
            Reply::Output(ProcessOutput::ok("john@doe.com\n")),
            Reply::Output(ProcessOutput::ok("John Doe\n")),
            Reply::Output(ProcessOutput::failed("")),
        ]));

        let expect = GitUser {
            name: "John Doe".into(),
            email: "john@doe.com".into(),
        };
        assert_eq!(gateway.current_global_user()?, Some(expect));
        assert_eq!(gateway.current_global_user()?, None);

        Ok(())
    }

    #[test]
    fn connection_probe_ignores_exit_status() -> anyhow::Result<()> {
        let gateway = Gateway::new(ScriptedSyscall::new([Reply::Output(ProcessOutput {
            success: false,
            stdout: String::new(),
            stderr: concat!(
                "Hi john! You've successfully authenticated, ",
                "but GitHub does not provide shell access.\n"
            )
            .into(),
        })]));

        let greeting = gateway.test_connection("github.com")?;

        assert!(is_authenticated(&greeting));
        assert_eq!(gateway.syscall().command_lines(), vec!["ssh -T git@github.com"]);

        Ok(())
    }

    #[test]
    fn connection_probe_reports_missing_ssh() {
        let gateway = Gateway::new(ScriptedSyscall::new([Reply::Missing]));

        let result = gateway.test_connection("github.com");

        assert!(matches!(
            result,
            Err(GatewayError::Syscall(SyscallError::Missing { .. }))
        ));
        assert!(!is_authenticated("Permission denied (publickey)."));
    }
}
