// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Record store management and manipulation.
//!
//! Gitpersona keeps two independent collections of records: accounts and
//! repository bindings. Both live in the __record store__ directory, each in
//! its own TOML file as an array of tables, so the user can inspect or hand
//! edit them between runs.
//!
//! # Record Store Layout
//!
//! The record store directory defaults to `$XDG_DATA_HOME/gitpersona`:
//!
//! - `accounts.toml` holds `[[account]]` entries.
//! - `repositories.toml` holds `[[repository]]` entries.
//!
//! # Loading and Saving
//!
//! Loading is lenient. A missing or malformed file is treated as an empty
//! collection, since the files are meant to be hand editable. A file that
//! exists but cannot be read at all is still an error.
//!
//! Every mutation mirrors the whole collection back to disk. Saving writes a
//! sibling temporary file first and renames it over the real one, so a crash
//! mid-save never clobbers previously saved data.

use crate::model::{Account, AccountDraft, RepositoryBinding};

use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs::{create_dir_all, read_to_string, rename, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Record that can be kept in a [`RecordStore`].
pub trait Record: Clone + Debug + Serialize + DeserializeOwned {
    /// Type of the unique key identifying a record.
    type Key: ?Sized + PartialEq + Debug;

    /// Name of the array of tables records are stored under.
    const TABLE: &'static str;

    /// Unique key of record.
    fn key(&self) -> &Self::Key;
}

impl Record for Account {
    type Key = str;
    const TABLE: &'static str = "account";

    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for RepositoryBinding {
    type Key = Path;
    const TABLE: &'static str = "repository";

    fn key(&self) -> &Path {
        &self.path
    }
}

/// Ordered collection of records mirrored to a file.
#[derive(Debug, Clone)]
pub struct RecordStore<R>
where
    R: Record,
{
    path: PathBuf,
    records: Vec<R>,
}

/// Store of accounts.
pub type AccountStore = RecordStore<Account>;

/// Store of repository bindings.
pub type RepositoryStore = RecordStore<RepositoryBinding>;

impl<R> RecordStore<R>
where
    R: Record,
{
    /// Open record store file at target path.
    ///
    /// Creates the parent directory if it does not exist yet, and leniently
    /// loads whatever records are already there.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::CreateDir`] if parent directory cannot be
    ///   created.
    /// - Return [`StoreError::Read`] if file exists but cannot be read.
    #[instrument(skip(path), level = "debug")]
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            create_dir_all(parent).map_err(|err| StoreError::CreateDir {
                source: err,
                path: parent.into(),
            })?;
        }

        let records = Self::load(&path)?;
        debug!("opened {} with {} records", path.display(), records.len());

        Ok(Self { path, records })
    }

    /// Load records from file at target path.
    ///
    /// Absent or malformed file yields no records.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Read`] if file exists but cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<R>> {
        let path = path.as_ref();
        let data = match read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(StoreError::Read {
                    source: err,
                    path: path.into(),
                })
            }
        };

        match toml::de::from_str::<BTreeMap<String, Vec<R>>>(&data) {
            Ok(mut tables) => Ok(tables.remove(R::TABLE).unwrap_or_default()),
            Err(err) => {
                warn!("ignoring malformed record file {}: {err}", path.display());
                Ok(Vec::new())
            }
        }
    }

    /// Write all records back to the store file.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Serialize`] if records cannot be serialized.
    /// - Return [`StoreError::Write`] if store file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.write_records(&self.records)
    }

    fn write_records(&self, records: &[R]) -> Result<()> {
        let tables = BTreeMap::from([(R::TABLE, records)]);
        let data = toml::ser::to_string_pretty(&tables)?;

        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        write(&staging, data.as_bytes())
            .and_then(|_| rename(&staging, &self.path))
            .map_err(|err| StoreError::Write {
                source: err,
                path: self.path.clone(),
            })?;
        debug!("saved {} records to {}", records.len(), self.path.display());

        Ok(())
    }

    /// Path to store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in insertion order.
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if store has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Lookup record by key.
    pub fn get(&self, key: &R::Key) -> Option<&R> {
        self.records.iter().find(|record| record.key() == key)
    }

    /// Insert record, or overwrite the record sharing its key.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Write`] if store cannot be saved.
    pub fn upsert(&mut self, record: R) -> Result<R> {
        let mut records = self.records.clone();
        match self.position(record.key()) {
            Some(index) => records[index] = record.clone(),
            None => records.push(record.clone()),
        }
        self.commit(records)?;

        Ok(record)
    }

    /// Replace existing record that shares a key with given record.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if no record has that key, leaving
    ///   store untouched.
    /// - Return [`StoreError::Write`] if store cannot be saved.
    pub fn replace(&mut self, record: R) -> Result<R> {
        let index = self
            .position(record.key())
            .ok_or_else(|| StoreError::NotFound(format!("{:?}", record.key())))?;
        let mut records = self.records.clone();
        records[index] = record.clone();
        self.commit(records)?;

        Ok(record)
    }

    /// Remove record by key.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if no record has that key.
    /// - Return [`StoreError::Write`] if store cannot be saved.
    pub fn remove(&mut self, key: &R::Key) -> Result<R> {
        let index = self
            .position(key)
            .ok_or_else(|| StoreError::NotFound(format!("{key:?}")))?;
        let mut records = self.records.clone();
        let record = records.remove(index);
        self.commit(records)?;

        Ok(record)
    }

    // INVARIANT: In-memory records only change once they are on disk.
    fn commit(&mut self, records: Vec<R>) -> Result<()> {
        self.write_records(&records)?;
        self.records = records;

        Ok(())
    }

    fn position(&self, key: &R::Key) -> Option<usize> {
        self.records.iter().position(|record| record.key() == key)
    }
}

impl RecordStore<Account> {
    /// Open account store inside record store directory.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if store cannot be opened.
    pub fn open_in(store_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(store_dir.as_ref().join("accounts.toml"))
    }

    /// Add new account with a freshly issued id.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Write`] if store cannot be saved.
    #[instrument(skip(self, draft), level = "debug")]
    pub fn add(&mut self, draft: AccountDraft) -> Result<Account> {
        let account = Account::new(draft);
        info!("add account {:?} ({})", account.alias, account.email);
        let mut records = self.records.clone();
        records.push(account.clone());
        self.commit(records)?;

        Ok(account)
    }

    /// Overwrite every field of existing account but its id.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if account does not exist.
    /// - Return [`StoreError::Write`] if store cannot be saved.
    #[instrument(skip(self, draft), level = "debug")]
    pub fn update(&mut self, id: &str, draft: AccountDraft) -> Result<Account> {
        info!("update account {id}");
        self.replace(Account::with_id(id, draft))
    }

    /// Delete account by id.
    ///
    /// Bindings that refer to the account are left alone.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if account does not exist.
    /// - Return [`StoreError::Write`] if store cannot be saved.
    #[instrument(skip(self), level = "debug")]
    pub fn delete(&mut self, id: &str) -> Result<Account> {
        info!("delete account {id}");
        self.remove(id)
    }

    /// Find account by id, falling back to alias.
    pub fn resolve(&self, id_or_alias: &str) -> Option<&Account> {
        self.get(id_or_alias).or_else(|| {
            self.records
                .iter()
                .find(|account| account.alias == id_or_alias)
        })
    }

    /// Find account whose email is exactly the given one.
    pub fn find_by_email(&self, email: &str) -> Option<&Account> {
        self.records.iter().find(|account| account.email == email)
    }
}

impl RecordStore<RepositoryBinding> {
    /// Open repository binding store inside record store directory.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if store cannot be opened.
    pub fn open_in(store_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(store_dir.as_ref().join("repositories.toml"))
    }

    /// Bind repository path to account, overwriting existing binding of the
    /// same path.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Write`] if store cannot be saved.
    #[instrument(skip(self, path, alias, account_id), level = "debug")]
    pub fn add_repo(
        &mut self,
        path: impl Into<PathBuf>,
        alias: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Result<RepositoryBinding> {
        let binding = RepositoryBinding::new(path, alias, account_id);
        info!(
            "bind {} to account {}",
            binding.path.display(),
            binding.account_id
        );
        self.upsert(binding)
    }

    /// Forget binding of repository path.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if path is not bound.
    /// - Return [`StoreError::Write`] if store cannot be saved.
    #[instrument(skip(self, path), level = "debug")]
    pub fn remove_repo(&mut self, path: impl AsRef<Path>) -> Result<RepositoryBinding> {
        info!("unbind {}", path.as_ref().display());
        self.remove(path.as_ref())
    }
}

/// All possible error types for record store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record has the requested key.
    #[error("no record found for {0}")]
    NotFound(String),

    /// Record store directory cannot be created.
    #[error("failed to create record store directory at {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Record store file exists, but cannot be read.
    #[error("failed to read record store file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Record store file cannot be written.
    #[error("failed to write record store file at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Records cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}

/// Friendly result alias :3
type Result<T, E = StoreError> = std::result::Result<T, E>;
