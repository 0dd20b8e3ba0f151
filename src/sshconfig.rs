// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! SSH client configuration editing.
//!
//! Gitpersona switches the SSH key used to talk to the code-hosting service
//! by rewriting one __host block__ inside the user's SSH client
//! configuration file. A host block starts at a `Host` line, and runs up to
//! (but not including) the next `Host` line, or the end of the file.
//!
//! # Ownership
//!
//! The SSH client configuration file belongs to the user, not to gitpersona.
//! Thus, only the host block matching the managed host is ever touched. Every
//! other line is carried over byte for byte in its original order. A copy of
//! the previous file is kept at `config.bak` before anything gets written.
//!
//! # Host Matching
//!
//! Matching is deliberately loose: any `Host` line _containing_ the host name
//! counts as a match. Thus, `Host github.com gist.github.com` is considered a
//! match for `github.com`.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{copy, create_dir_all, read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Identity block for a host.
///
/// Always renders to the same fixed shape:
///
/// ```text
/// Host github.com
///     HostName github.com
///     User git
///     IdentityFile /home/john/.ssh/id_ed25519
///     IdentitiesOnly yes
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBlock {
    host: String,
    identity_file: PathBuf,
}

impl HostBlock {
    /// Construct new identity block.
    pub fn new(host: impl Into<String>, identity_file: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            identity_file: identity_file.into(),
        }
    }

    /// Host the block applies to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Private key the block points to.
    pub fn identity_file(&self) -> &Path {
        &self.identity_file
    }

    /// Render block into newline terminated lines.
    pub fn lines(&self) -> Vec<String> {
        let identity_file = self.identity_file.to_string_lossy();
        let identity_file = if identity_file.contains(char::is_whitespace) {
            format!("\"{identity_file}\"")
        } else {
            identity_file.into_owned()
        };

        vec![
            format!("Host {}\n", self.host),
            format!("    HostName {}\n", self.host),
            "    User git\n".into(),
            format!("    IdentityFile {identity_file}\n"),
            "    IdentitiesOnly yes\n".into(),
        ]
    }
}

impl Display for HostBlock {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.lines().concat().as_str())
    }
}

fn is_host_line(line: &str) -> bool {
    line.trim().starts_with("Host ")
}

fn matches_host(line: &str, host: &str) -> bool {
    is_host_line(line) && line.trim().contains(host)
}

/// Find IdentityFile of first host block matching host.
///
/// The path is tilde expanded. Yields nothing when no matching block has an
/// IdentityFile entry.
pub fn find_identity_for_host(content: &str, host: &str) -> Option<PathBuf> {
    let mut in_block = false;
    for line in content.lines() {
        let stripped = line.trim();
        if is_host_line(stripped) {
            in_block = matches_host(stripped, host);
            continue;
        }

        if !in_block || !stripped.to_lowercase().starts_with("identityfile") {
            continue;
        }

        let value = stripped
            .split_once(char::is_whitespace)
            .map(|(_, value)| value.trim().trim_matches('"'))
            .filter(|value| !value.is_empty());
        if let Some(value) = value {
            return Some(PathBuf::from(shellexpand::tilde(value).into_owned()));
        }
    }

    None
}

/// Replace host block matching host with new block lines.
///
/// The first matching block is swapped for `block` in place, any further
/// matching block is dropped, and every other line passes through untouched.
/// If nothing matches, `block` is appended at the end, after a newline if the
/// last line lacks one.
pub fn replace_block(content: &str, host: &str, block: &[String]) -> String {
    let mut output = String::with_capacity(content.len());
    let mut in_block = false;
    let mut replaced = false;

    // INVARIANT: Keep original line terminators intact.
    for line in content.split_inclusive('\n') {
        if is_host_line(line) {
            in_block = matches_host(line, host);
            if in_block && !replaced {
                output.extend(block.iter().map(String::as_str));
                replaced = true;
            }

            if in_block {
                continue;
            }
        }

        if !in_block {
            output.push_str(line);
        }
    }

    if !replaced {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.extend(block.iter().map(String::as_str));
    }

    output
}

/// Manage host blocks in SSH client configuration file.
#[derive(Debug, Clone)]
pub struct SshConfigDrafter {
    config_path: PathBuf,
}

impl SshConfigDrafter {
    /// Construct new drafter for SSH client configuration file at path.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Path to SSH client configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Path to backup of previous configuration.
    pub fn backup_path(&self) -> PathBuf {
        let mut path = self.config_path.clone().into_os_string();
        path.push(".bak");
        PathBuf::from(path)
    }

    /// Find IdentityFile currently used for host.
    ///
    /// # Errors
    ///
    /// - Return [`SshConfigError::Read`] if configuration file exists but
    ///   cannot be read.
    pub fn find_identity_for_host(&self, host: &str) -> Result<Option<PathBuf>> {
        Ok(self
            .read()?
            .and_then(|content| find_identity_for_host(&content, host)))
    }

    /// Swap host block of configuration file for a new one.
    ///
    /// Verifies that the identity file of the new block exists before
    /// touching anything. Creates the configuration directory if needed, and
    /// backs up the previous configuration before overwriting it.
    ///
    /// # Errors
    ///
    /// - Return [`SshConfigError::MissingIdentityFile`] if identity file of
    ///   new block does not exist.
    /// - Return [`SshConfigError::CreateDir`] if configuration directory
    ///   cannot be created.
    /// - Return [`SshConfigError::Read`] if configuration cannot be read.
    /// - Return [`SshConfigError::Backup`] if backup cannot be made.
    /// - Return [`SshConfigError::Write`] if configuration cannot be written.
    #[instrument(skip(self, block), level = "debug")]
    pub fn replace_block(&self, block: &HostBlock) -> Result<()> {
        if !block.identity_file().exists() {
            return Err(SshConfigError::MissingIdentityFile {
                path: block.identity_file().into(),
            });
        }

        if let Some(parent) = self
            .config_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            create_dir_all(parent).map_err(|err| SshConfigError::CreateDir {
                source: err,
                path: parent.into(),
            })?;
        }

        let content = self.read()?;
        let updated = replace_block(
            content.as_deref().unwrap_or_default(),
            block.host(),
            &block.lines(),
        );

        if content.is_some() {
            let backup_path = self.backup_path();
            debug!("backup {:?} to {:?}", self.config_path.display(), backup_path.display());
            copy(&self.config_path, &backup_path).map_err(|err| SshConfigError::Backup {
                source: err,
                path: backup_path,
            })?;
        }

        write(&self.config_path, updated.as_bytes()).map_err(|err| SshConfigError::Write {
            source: err,
            path: self.config_path.clone(),
        })?;
        info!(
            "point host {} at {:?} in {:?}",
            block.host(),
            block.identity_file().display(),
            self.config_path.display()
        );

        Ok(())
    }

    fn read(&self) -> Result<Option<String>> {
        match read_to_string(&self.config_path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SshConfigError::Read {
                source: err,
                path: self.config_path.clone(),
            }),
        }
    }
}

/// SSH client configuration editing error types.
#[derive(Debug, thiserror::Error)]
pub enum SshConfigError {
    /// Identity file of new host block does not exist.
    #[error("identity file not found at {:?}", path.display())]
    MissingIdentityFile { path: PathBuf },

    /// Configuration directory cannot be created.
    #[error("failed to create ssh directory at {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration file cannot be read.
    #[error("failed to read ssh config at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Previous configuration cannot be backed up.
    #[error("failed to back up ssh config to {:?}", path.display())]
    Backup {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration file cannot be written.
    #[error("failed to write ssh config at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = SshConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    fn block(identity_file: &str) -> HostBlock {
        HostBlock::new("github.com", identity_file)
    }

    #[test]
    fn host_block_layout() {
        let result = block("/home/john/.ssh/id_ed25519").to_string();
        let expect = indoc! {r#"
            Host github.com
                HostName github.com
                User git
                IdentityFile /home/john/.ssh/id_ed25519
                IdentitiesOnly yes
        "#};
        assert_eq!(result, expect);

        let result = block("/home/john/my keys/id_ed25519").lines();
        assert_eq!(result[3], "    IdentityFile \"/home/john/my keys/id_ed25519\"\n");
    }

    #[test]
    fn replace_block_in_place() {
        let content = indoc! {r#"
            Host example.com
              HostName x
            Host github.com
              IdentityFile /old
            Host other.com
              Foo bar
        "#};

        let result = replace_block(content, "github.com", &block("/new").lines());
        let expect = indoc! {r#"
            Host example.com
              HostName x
            Host github.com
                HostName github.com
                User git
                IdentityFile /new
                IdentitiesOnly yes
            Host other.com
              Foo bar
        "#};
        assert_eq!(result, expect);
    }

    #[test]
    fn replace_block_appends_when_missing() {
        let content = "Host example.com\n  HostName x";

        let result = replace_block(content, "github.com", &block("/new").lines());
        let expect = format!("Host example.com\n  HostName x\n{}", block("/new"));
        assert_eq!(result, expect);

        let result = replace_block("", "github.com", &block("/new").lines());
        assert_eq!(result, block("/new").to_string());
    }

    #[test]
    fn replace_block_leaves_exactly_one_block() {
        let content = indoc! {r#"
            Host github.com
              IdentityFile /first
            Host example.com
              HostName x
            Host github.com
              IdentityFile /second
        "#};

        let result = replace_block(content, "github.com", &block("/new").lines());
        let expect = format!("{}Host example.com\n  HostName x\n", block("/new"));
        assert_eq!(result, expect);
    }

    #[test]
    fn replace_block_preserves_crlf_elsewhere() {
        let content = "Host example.com\r\n  HostName x\r\nHost github.com\r\n  User git\r\n";

        let result = replace_block(content, "github.com", &block("/new").lines());
        let expect = format!("Host example.com\r\n  HostName x\r\n{}", block("/new"));
        assert_eq!(result, expect);
    }

    #[sealed_test(env = [("HOME", "/home/john")])]
    fn find_identity_expands_tilde() {
        let content = indoc! {r#"
            Host gitlab.com
              IdentityFile ~/.ssh/id_gitlab
            Host github.com
              HostName github.com
              identityFile ~/.ssh/id_foo
        "#};

        let result = find_identity_for_host(content, "github.com");
        assert_eq!(result, Some(PathBuf::from("/home/john/.ssh/id_foo")));
    }

    #[test]
    fn find_identity_yields_nothing_without_match() {
        let content = indoc! {r#"
            Host gitlab.com
              IdentityFile /gitlab
            Host github.com
              User git
            Host other.com
              IdentityFile /other
        "#};

        assert_eq!(find_identity_for_host(content, "github.com"), None);
        assert_eq!(find_identity_for_host("", "github.com"), None);
    }

    #[sealed_test]
    fn drafter_backs_up_and_rewrites() -> anyhow::Result<()> {
        let original = "Host example.com\n  HostName x\n";
        std::fs::create_dir(".ssh")?;
        std::fs::write(".ssh/config", original)?;
        std::fs::write("id_work", "secret")?;

        let drafter = SshConfigDrafter::new(".ssh/config");
        drafter.replace_block(&block("id_work"))?;

        assert_eq!(std::fs::read_to_string(".ssh/config.bak")?, original);
        assert_eq!(
            std::fs::read_to_string(".ssh/config")?,
            format!("{original}{}", block("id_work"))
        );
        assert_eq!(
            drafter.find_identity_for_host("github.com")?,
            Some(PathBuf::from("id_work"))
        );

        Ok(())
    }

    #[sealed_test]
    fn drafter_creates_missing_config() -> anyhow::Result<()> {
        std::fs::write("id_work", "secret")?;

        let drafter = SshConfigDrafter::new("nested/.ssh/config");
        assert_eq!(drafter.find_identity_for_host("github.com")?, None);
        drafter.replace_block(&block("id_work"))?;

        assert_eq!(
            std::fs::read_to_string("nested/.ssh/config")?,
            block("id_work").to_string()
        );
        assert!(!drafter.backup_path().exists());

        Ok(())
    }

    #[sealed_test]
    fn drafter_refuses_missing_identity_file() -> anyhow::Result<()> {
        let original = "Host github.com\n  IdentityFile /old\n";
        std::fs::write("config", original)?;

        let drafter = SshConfigDrafter::new("config");
        let result = drafter.replace_block(&block("id_missing"));

        assert!(matches!(
            result,
            Err(SshConfigError::MissingIdentityFile { .. })
        ));
        assert_eq!(std::fs::read_to_string("config")?, original);
        assert!(!drafter.backup_path().exists());

        Ok(())
    }
}
