// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Identity switching.
//!
//! An __identity__ is what git and SSH need to know to act as an account: a
//! name and email to commit with, a private SSH key to authenticate with, and
//! optionally a GPG key to sign with.
//!
//! # Activation
//!
//! Activating an identity makes it the machine-wide default. The global git
//! identity gets set first, then the host block of the SSH client
//! configuration gets pointed at the identity's key. See [`activate`].
//!
//! # Binding
//!
//! Binding pins one repository to an identity, no matter which identity is
//! active. The repository's local git identity gets set along with a
//! `core.sshCommand` that forces the identity's key, then the binding gets
//! recorded. See [`bind`].
//!
//! # Forward Only
//!
//! Gitpersona only ever applies configuration. Nothing is rolled back when a
//! later step fails, because every step is safe to apply again. Errors name
//! the step that failed so the caller can retry just that. Unbinding a
//! repository only forgets the binding, it does not revert the repository's
//! local configuration.

pub mod activate;
pub mod bind;
pub mod import;

use crate::{
    gateway::Gateway,
    model::Account,
    sshconfig::SshConfigDrafter,
    syscall::{Syscall, SystemSyscall},
};

use std::path::PathBuf;

/// Git, SSH, and GPG identity to act as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Value for `user.name`.
    pub name: String,

    /// Value for `user.email`.
    pub email: String,

    /// Private SSH key to authenticate with.
    pub ssh_key_path: PathBuf,

    /// Key to sign commits with.
    pub gpg_key_id: Option<String>,
}

impl From<&Account> for Identity {
    fn from(account: &Account) -> Self {
        Self {
            name: account.username.clone(),
            email: account.email.clone(),
            ssh_key_path: account.ssh_key_path.clone(),
            gpg_key_id: account.gpg_key_id.clone(),
        }
    }
}

/// Orchestrates identity activation, binding, and import.
///
/// Holds no state between calls beyond where things live.
#[derive(Debug)]
pub struct Switcher<S = SystemSyscall>
where
    S: Syscall,
{
    pub(crate) gateway: Gateway<S>,
    pub(crate) ssh_config: SshConfigDrafter,
    pub(crate) host: String,
}

impl<S> Switcher<S>
where
    S: Syscall,
{
    /// Construct new switcher managing the given host.
    pub fn new(gateway: Gateway<S>, ssh_config: SshConfigDrafter, host: impl Into<String>) -> Self {
        Self {
            gateway,
            ssh_config,
            host: host.into(),
        }
    }

    /// Gateway to external tools.
    pub fn gateway(&self) -> &Gateway<S> {
        &self.gateway
    }

    /// SSH client configuration being managed.
    pub fn ssh_config(&self) -> &SshConfigDrafter {
        &self.ssh_config
    }

    /// Managed host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Probe SSH authentication against managed host.
    ///
    /// # Errors
    ///
    /// - Return [`crate::gateway::GatewayError`] if ssh cannot be run.
    pub fn test_connection(&self) -> crate::gateway::Result<String> {
        self.gateway.test_connection(&self.host)
    }
}
