// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the optional settings file that tells gitpersona
//! where things live: the record store, the SSH client configuration file,
//! and the directory freshly generated SSH keys should go to. Every setting
//! is optional, and falls back to a well-known default when left out.
//!
//! # General Layout
//!
//! ```toml
//! host = "github.com"
//! store_dir = "$XDG_DATA_HOME/gitpersona"
//! ssh_config = "~/.ssh/config"
//! keys_dir = "~/.ssh"
//! ```
//!
//! Path settings go through full shell expansion when parsed, so tildes and
//! environment variables can be used freely.

use crate::path::{default_ssh_config_path, default_ssh_dir, default_store_dir, NoWayHome};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Code-hosting host that gitpersona manages by default.
pub const DEFAULT_HOST: &str = "github.com";

/// Settings layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Host whose SSH identity block gets rewritten, and that gets probed.
    pub host: Option<String>,

    /// Directory housing account and repository binding files.
    pub store_dir: Option<PathBuf>,

    /// SSH client configuration file to manage.
    pub ssh_config: Option<PathBuf>,

    /// Default output directory for generated SSH keys.
    pub keys_dir: Option<PathBuf>,
}

impl Settings {
    /// Load settings from file at target path.
    ///
    /// A missing file simply means default settings.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if settings file exists but cannot be
    ///   read.
    /// - Return [`ConfigError::Deserialize`] if settings file is malformed.
    /// - Return [`ConfigError::ShellExpansion`] if a path setting refers to
    ///   an undefined environment variable.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(data) => data.parse(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no settings file at {:?}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Read {
                source: err,
                path: path.into(),
            }),
        }
    }

    /// Host to manage, defaults to [`DEFAULT_HOST`].
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Record store directory, or the XDG default.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if default cannot be determined.
    pub fn store_dir(&self) -> Result<PathBuf> {
        match &self.store_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(default_store_dir()?),
        }
    }

    /// SSH client configuration file, or `~/.ssh/config`.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if default cannot be determined.
    pub fn ssh_config(&self) -> Result<PathBuf> {
        match &self.ssh_config {
            Some(path) => Ok(path.clone()),
            None => Ok(default_ssh_config_path()?),
        }
    }

    /// Output directory of generated SSH keys, or `~/.ssh`.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if default cannot be determined.
    pub fn keys_dir(&self) -> Result<PathBuf> {
        match &self.keys_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(default_ssh_dir()?),
        }
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on all path settings.
        for path in [
            &mut settings.store_dir,
            &mut settings.ssh_config,
            &mut settings.keys_dir,
        ]
        .into_iter()
        .flatten()
        {
            *path = expand(path)?;
        }

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Settings file exists, but cannot be read.
    #[error("failed to read settings file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Default location cannot be determined.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
