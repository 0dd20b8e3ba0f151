// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository binding.

use crate::{
    gateway::{is_repository, GatewayError},
    identity::Switcher,
    model::{Account, RepositoryBinding},
    store::{RepositoryStore, StoreError},
    syscall::Syscall,
};

use std::path::{Path, PathBuf};
use tracing::{info, instrument};

impl<S> Switcher<S>
where
    S: Syscall,
{
    /// Pin repository to account.
    ///
    /// Checks that path is a git working directory, sets its local identity to
    /// the account's, then records the binding, replacing any previous binding
    /// of the same path.
    ///
    /// # Errors
    ///
    /// - Return [`BindError::NotARepository`] without running anything if
    ///   path has no `.git` entry.
    /// - Return [`BindError::LocalIdentity`] if local git identity cannot be
    ///   set. Nothing gets recorded.
    /// - Return [`BindError::Store`] if binding cannot be recorded. Local git
    ///   identity stays applied.
    #[instrument(skip(self, store, repo_path, alias, account), level = "debug")]
    pub fn bind(
        &self,
        store: &mut RepositoryStore,
        repo_path: impl AsRef<Path>,
        alias: impl Into<String>,
        account: &Account,
    ) -> Result<RepositoryBinding> {
        let repo_path = repo_path.as_ref();
        if !is_repository(repo_path) {
            return Err(BindError::NotARepository {
                path: repo_path.into(),
            });
        }

        self.gateway
            .set_local_identity(
                repo_path,
                &account.username,
                &account.email,
                &account.ssh_key_path,
            )
            .map_err(BindError::LocalIdentity)?;

        let binding = store
            .add_repo(repo_path, alias, &account.id)
            .map_err(BindError::Store)?;
        info!("repository {:?} bound to {}", binding.alias, account.alias);

        Ok(binding)
    }

    /// Forget binding of repository.
    ///
    /// Leaves the repository's local git configuration as is.
    ///
    /// # Errors
    ///
    /// - Return [`BindError::Store`] if path is not bound, or the store cannot
    ///   be saved.
    #[instrument(skip(self, store, repo_path), level = "debug")]
    pub fn unbind(
        &self,
        store: &mut RepositoryStore,
        repo_path: impl AsRef<Path>,
    ) -> Result<RepositoryBinding> {
        store.remove_repo(repo_path).map_err(BindError::Store)
    }
}

/// Repository binding error types.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// Target path is not a git working directory.
    #[error("not a valid git repository (no .git entry) at {:?}", path.display())]
    NotARepository { path: PathBuf },

    /// Local git identity cannot be set.
    #[error("binding failed while setting local git identity")]
    LocalIdentity(#[source] GatewayError),

    /// Binding cannot be recorded.
    #[error("binding failed while recording repository")]
    Store(#[source] StoreError),
}

/// Friendly result alias :3
type Result<T, E = BindError> = std::result::Result<T, E>;
