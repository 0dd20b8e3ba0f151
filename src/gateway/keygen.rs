// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Key generation.
//!
//! Drive `ssh-keygen` and `gpg` to produce fresh key pairs for an account,
//! and hand back the public half so the user can register it with the
//! code-hosting service.
//!
//! # GPG Key Identifiers
//!
//! Unattended GPG key generation does not print the new key's identifier in
//! any structured way. So, the identifier is scraped from the tool's log in
//! the following order:
//!
//! 1. A `key <ID> marked as ultimately trusted` line.
//! 2. A `key <ID> created` line.
//! 3. The first `pub <algo>/<ID>` line of `gpg --list-keys` for the email.
//!
//! If all three come up empty, generation is reported as a failure carrying
//! the original log.

use crate::{
    gateway::Gateway,
    model::ValidationError,
    syscall::{Invocation, Syscall, SyscallError},
};

use regex::Regex;
use std::{
    fs::{create_dir_all, read_to_string},
    path::{Path, PathBuf},
    sync::LazyLock,
};
use tracing::{debug, info, instrument, warn};

static TRUSTED_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)key\s+([0-9A-F]+)\s+marked as ultimately trusted").expect("valid regex")
});

static CREATED_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)key\s+([0-9A-F]+)\s+created").expect("valid regex"));

static LISTED_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)pub\s+[a-z0-9]+/([0-9A-F]+)").expect("valid regex"));

/// Freshly generated SSH key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSshKey {
    /// Path to private key.
    pub private_key: PathBuf,

    /// Contents of public key file.
    pub public_key: String,
}

/// Freshly generated GPG key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedGpgKey {
    /// Long key identifier, usable as `user.signingkey`.
    pub key_id: String,

    /// ASCII armored public key block.
    pub public_key: String,
}

impl<S> Gateway<S>
where
    S: Syscall,
{
    /// Generate ed25519 SSH key pair without a passphrase.
    ///
    /// Creates output directory if needed. Never overwrites an existing key.
    ///
    /// # Errors
    ///
    /// - Return [`KeygenError::KeyExists`] if a file already exists at the
    ///   target path.
    /// - Return [`KeygenError::CreateDir`] if output directory cannot be
    ///   created.
    /// - Return [`KeygenError::Syscall`] if ssh-keygen cannot be run, or fails.
    /// - Return [`KeygenError::ReadPublicKey`] if public key cannot be read
    ///   back.
    #[instrument(skip(self, email, filename, output_dir), level = "debug")]
    pub fn generate_ssh_key(
        &self,
        email: &str,
        filename: &str,
        output_dir: &Path,
    ) -> Result<GeneratedSshKey> {
        create_dir_all(output_dir).map_err(|err| KeygenError::CreateDir {
            source: err,
            path: output_dir.into(),
        })?;

        let private_key = output_dir.join(filename);
        if private_key.exists() {
            return Err(KeygenError::KeyExists { path: private_key });
        }

        let invocation = Invocation::new("ssh-keygen")
            .args(["-t", "ed25519", "-C", email, "-f"])
            .args([private_key.as_os_str(), "-N".as_ref(), "".as_ref()]);
        self.syscall().run_checked(&invocation)?;

        let mut public_path = private_key.clone().into_os_string();
        public_path.push(".pub");
        let public_path = PathBuf::from(public_path);
        let public_key = read_to_string(&public_path)
            .map_err(|err| KeygenError::ReadPublicKey {
                source: err,
                path: public_path,
            })?
            .trim()
            .to_string();
        info!("generated ssh key at {:?}", private_key.display());

        Ok(GeneratedSshKey {
            private_key,
            public_key,
        })
    }

    /// Generate RSA 4096 GPG key that never expires.
    ///
    /// # Errors
    ///
    /// - Return [`KeygenError::Validation`] if passphrase is empty, or if
    ///   name, email, or passphrase holds a control character.
    /// - Return [`KeygenError::Syscall`] if gpg cannot be run, or fails to
    ///   generate the key.
    /// - Return [`KeygenError::KeyIdNotFound`] if the new key's identifier
    ///   cannot be recovered.
    /// - Return [`KeygenError::Export`] if public key cannot be exported.
    #[instrument(skip(self, name, email, passphrase), level = "debug")]
    pub fn generate_gpg_key(
        &self,
        name: &str,
        email: &str,
        passphrase: &str,
    ) -> Result<GeneratedGpgKey> {
        if passphrase.is_empty() {
            return Err(ValidationError::EmptyPassphrase.into());
        }

        // INVARIANT: Every value stays on its own line of the batch block.
        for (field, value) in [("name", name), ("email", email), ("passphrase", passphrase)] {
            if value.chars().any(char::is_control) {
                return Err(ValidationError::ControlCharacter(field).into());
            }
        }

        let output = self.syscall().run_checked(
            &Invocation::new("gpg")
                .args(["--batch", "--gen-key"])
                .stdin(batch_parameters(name, email, passphrase)),
        )?;
        let log = output.combined();

        let key_id = match extract_gpg_key_id(&log) {
            Some(key_id) => key_id,
            None => {
                warn!("no key id in gpg log, falling back to listing keys of {email}");
                self.list_key_id(email)?
                    .ok_or(KeygenError::KeyIdNotFound { log })?
            }
        };
        debug!("generated gpg key {key_id}");

        let public_key = self
            .syscall()
            .run_checked(&Invocation::new("gpg").args(["--armor", "--export", key_id.as_str()]))
            .map_err(|err| KeygenError::Export {
                source: err,
                key_id: key_id.clone(),
            })?
            .stdout;
        if public_key.trim().is_empty() {
            return Err(KeygenError::Export {
                source: SyscallError::Failed {
                    program: "gpg".into(),
                    stderr: "exported public key is empty".into(),
                },
                key_id,
            });
        }
        info!("generated gpg key {key_id} for {email}");

        Ok(GeneratedGpgKey { key_id, public_key })
    }

    fn list_key_id(&self, email: &str) -> Result<Option<String>> {
        let output = self.syscall().run(
            &Invocation::new("gpg").args(["--list-keys", "--keyid-format", "LONG", email]),
        )?;

        Ok(extract_listed_key_id(&output.stdout))
    }
}

/// Parameter block for unattended GPG key generation.
fn batch_parameters(name: &str, email: &str, passphrase: &str) -> String {
    format!(
        "Key-Type: RSA\n\
         Key-Length: 4096\n\
         Subkey-Type: RSA\n\
         Subkey-Length: 4096\n\
         Name-Real: {name}\n\
         Name-Email: {email}\n\
         Expire-Date: 0\n\
         Passphrase: {passphrase}\n\
         %commit\n"
    )
}

/// Extract key identifier from GPG key generation log.
pub fn extract_gpg_key_id(log: &str) -> Option<String> {
    TRUSTED_KEY
        .captures(log)
        .or_else(|| CREATED_KEY.captures(log))
        .map(|captures| captures[1].to_string())
}

/// Extract first key identifier from `gpg --list-keys --keyid-format LONG`.
pub fn extract_listed_key_id(listing: &str) -> Option<String> {
    LISTED_KEY
        .captures(listing)
        .map(|captures| captures[1].to_string())
}

/// Suggest SSH key filename for account alias.
///
/// Keeps alphanumerics, dashes, and underscores of the alias, lowercased.
pub fn suggest_key_filename(alias: &str) -> String {
    let safe_alias = alias
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_'))
        .collect::<String>()
        .to_lowercase();

    format!("id_ed25519_{safe_alias}")
}

/// Key generation error types.
#[derive(Debug, thiserror::Error)]
pub enum KeygenError {
    /// Input is not acceptable.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Refuse to overwrite existing key.
    #[error("key file already exists at {:?}", path.display())]
    KeyExists { path: PathBuf },

    /// Output directory cannot be created.
    #[error("failed to create key directory at {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Generated public key cannot be read back.
    #[error("failed to read public key at {:?}", path.display())]
    ReadPublicKey {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Key generation tool cannot be run, or fails.
    #[error(transparent)]
    Syscall(#[from] SyscallError),

    /// Identifier of generated GPG key cannot be recovered.
    #[error("gpg key generated, but its key id could not be found. Log:\n{log}")]
    KeyIdNotFound { log: String },

    /// Public half of generated GPG key cannot be exported.
    #[error("gpg key {key_id} generated, but its public key could not be exported")]
    Export {
        #[source]
        source: SyscallError,
        key_id: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = KeygenError> = std::result::Result<T, E>;
