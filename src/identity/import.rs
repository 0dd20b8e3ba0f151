// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Import of the identity currently in use.
//!
//! Reconstructs an account from whatever is configured machine-wide: the
//! global git user, and the IdentityFile of the managed host's block in the
//! SSH client configuration. When no IdentityFile can be found, a configured
//! global credential helper is taken as a sign that the user authenticates
//! over HTTPS instead.
//!
//! This is a best-effort guess. The matching of stored accounts is a plain
//! exact comparison of email addresses.

use crate::{
    gateway::GatewayError,
    identity::Switcher,
    sshconfig::SshConfigError,
    store::AccountStore,
    syscall::Syscall,
};

use std::path::PathBuf;
use tracing::{debug, instrument};

/// How the current identity authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSource {
    /// SSH with the given private key.
    Ssh(PathBuf),

    /// HTTPS through a credential helper, so there is no key to import.
    Https,

    /// Neither an IdentityFile nor a credential helper was found.
    Unknown,
}

/// Identity currently configured machine-wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedIdentity {
    /// Global `user.name`.
    pub username: String,

    /// Global `user.email`.
    pub email: String,

    /// How the identity authenticates.
    pub source: AuthSource,

    /// Id of stored account with the same email, if any.
    pub matched_account: Option<String>,
}

impl<S> Switcher<S>
where
    S: Syscall,
{
    /// Read identity currently configured machine-wide.
    ///
    /// # Errors
    ///
    /// - Return [`ImportError::NoGlobalUser`] if global `user.name` or
    ///   `user.email` is not set.
    /// - Return [`ImportError::Gateway`] if git cannot be run.
    /// - Return [`ImportError::SshConfig`] if SSH client configuration exists
    ///   but cannot be read.
    #[instrument(skip(self, accounts), level = "debug")]
    pub fn import_current(&self, accounts: &AccountStore) -> Result<ImportedIdentity> {
        let user = self
            .gateway
            .current_global_user()?
            .ok_or(ImportError::NoGlobalUser)?;

        let source = match self.ssh_config.find_identity_for_host(&self.host)? {
            Some(path) => AuthSource::Ssh(path),
            None if self.gateway.credential_helper()?.is_some() => AuthSource::Https,
            None => AuthSource::Unknown,
        };
        debug!("current identity authenticates via {source:?}");

        let matched_account = accounts
            .find_by_email(&user.email)
            .map(|account| account.id.clone());

        Ok(ImportedIdentity {
            username: user.name,
            email: user.email,
            source,
            matched_account,
        })
    }
}

/// Identity import error types.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// No global git user is configured.
    #[error("no global git user.name and user.email configured")]
    NoGlobalUser,

    /// Git cannot be run.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// SSH client configuration cannot be read.
    #[error(transparent)]
    SshConfig(#[from] SshConfigError),
}

/// Friendly result alias :3
type Result<T, E = ImportError> = std::result::Result<T, E>;
