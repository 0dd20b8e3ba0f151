// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Record layouts.
//!
//! An __account__ is a named git identity: the name and email to commit
//! with, the SSH key to authenticate with, and optionally a GPG key to sign
//! commits with. A __repository binding__ pins one working directory to one
//! account, overriding whatever account is active machine-wide.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Stored git identity.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Account {
    /// Unique identifier, never changes once issued.
    pub id: String,

    /// Human friendly name to refer to the account by.
    pub alias: String,

    /// Value for `user.name`.
    pub username: String,

    /// Value for `user.email`.
    pub email: String,

    /// Private SSH key used to authenticate as this account.
    pub ssh_key_path: PathBuf,

    /// Key used for `user.signingkey`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpg_key_id: Option<String>,
}

impl Account {
    /// Construct new account from draft with a freshly issued id.
    pub fn new(draft: AccountDraft) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), draft)
    }

    /// Construct account from draft keeping an existing id.
    pub fn with_id(id: impl Into<String>, draft: AccountDraft) -> Self {
        let AccountDraft {
            alias,
            username,
            email,
            ssh_key_path,
            gpg_key_id,
        } = draft.normalized();

        Self {
            id: id.into(),
            alias,
            username,
            email,
            ssh_key_path,
            gpg_key_id,
        }
    }

    /// Extract every field but the id.
    pub fn to_draft(&self) -> AccountDraft {
        AccountDraft {
            alias: self.alias.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            ssh_key_path: self.ssh_key_path.clone(),
            gpg_key_id: self.gpg_key_id.clone(),
        }
    }
}

/// Account fields as supplied by the user.
///
/// Stores do not validate drafts. Callers taking input from the user should
/// run [`AccountDraft::validate`] before handing a draft over.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct AccountDraft {
    pub alias: String,
    pub username: String,
    pub email: String,
    pub ssh_key_path: PathBuf,
    pub gpg_key_id: Option<String>,
}

impl AccountDraft {
    /// Trim text fields, and treat a blank GPG key id as no key at all.
    pub fn normalized(self) -> Self {
        Self {
            alias: self.alias.trim().into(),
            username: self.username.trim().into(),
            email: self.email.trim().into(),
            ssh_key_path: self.ssh_key_path,
            gpg_key_id: self
                .gpg_key_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        }
    }

    /// Check that all required fields are filled, and that the SSH key
    /// exists on disk.
    ///
    /// # Errors
    ///
    /// - Return [`ValidationError::MissingField`] for the first blank
    ///   required field.
    /// - Return [`ValidationError::KeyFileMissing`] if SSH key does not exist.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("alias", self.alias.as_str()),
            ("username", self.username.as_str()),
            ("email", self.email.as_str()),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ValidationError::MissingField(*name));
        }

        if self.ssh_key_path.as_os_str().is_empty() {
            return Err(ValidationError::MissingField("ssh_key_path"));
        }

        if !self.ssh_key_path.exists() {
            return Err(ValidationError::KeyFileMissing(self.ssh_key_path.clone()));
        }

        Ok(())
    }
}

/// Binding of a repository working directory to an account.
///
/// The account id is a weak reference. Deleting the account leaves the
/// binding dangling, and lookups are expected to cope with that.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RepositoryBinding {
    /// Working directory of the repository.
    pub path: PathBuf,

    /// Display name, usually the folder name.
    pub alias: String,

    /// Id of the bound account.
    pub account_id: String,
}

impl RepositoryBinding {
    /// Construct new binding.
    pub fn new(
        path: impl Into<PathBuf>,
        alias: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            alias: alias.into(),
            account_id: account_id.into(),
        }
    }
}

/// Derive display alias of a repository from its folder name.
pub fn folder_alias(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.as_ref().to_string_lossy().into_owned())
}

/// Boundary validation error types.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Required field left blank.
    #[error("required field {0:?} is empty")]
    MissingField(&'static str),

    /// SSH key does not exist on disk.
    #[error("ssh key file not found at {:?}", .0.display())]
    KeyFileMissing(PathBuf),

    /// GPG keys must be protected by a passphrase.
    #[error("gpg passphrase must not be empty")]
    EmptyPassphrase,

    /// Field would break out of a line-based parameter block.
    #[error("field {0:?} must not contain control characters")]
    ControlCharacter(&'static str),
}
