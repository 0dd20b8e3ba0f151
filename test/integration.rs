// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{has_git, RepoFixture};

use anyhow::Result;
use gitpersona::{
    config::Settings,
    model::AccountDraft,
    sshconfig::{HostBlock, SshConfigDrafter},
    store::StoreError,
    AccountStore, Gateway, RepositoryStore, Switcher,
};
use indoc::{formatdoc, indoc};
use pretty_assertions::assert_eq;
use std::{fs, path::Path, process::Command};
use tempfile::tempdir;

fn draft(alias: &str, key: &Path) -> AccountDraft {
    AccountDraft {
        alias: alias.into(),
        username: "John Doe".into(),
        email: format!("{alias}@doe.com"),
        ssh_key_path: key.into(),
        gpg_key_id: None,
    }
}

#[test]
fn accounts_survive_reopen() -> Result<()> {
    let dir = tempdir()?;
    let key = dir.path().join("id_work");

    let mut accounts = AccountStore::open_in(dir.path())?;
    let work = accounts.add(draft("work", &key))?;
    let personal = accounts.add(draft("personal", &key))?;
    accounts.delete(&personal.id)?;

    let reopened = AccountStore::open_in(dir.path())?;
    assert_eq!(reopened.records(), &[work.clone()]);
    assert_eq!(reopened.resolve("work"), Some(&work));
    assert_eq!(reopened.resolve(&work.id), Some(&work));
    assert!(!dir.path().join("accounts.toml.tmp").exists());

    Ok(())
}

#[test]
fn stores_are_independent_files() -> Result<()> {
    let dir = tempdir()?;
    let key = dir.path().join("id_work");

    let mut accounts = AccountStore::open_in(dir.path())?;
    let work = accounts.add(draft("work", &key))?;
    let mut repositories = RepositoryStore::open_in(dir.path())?;
    repositories.add_repo(dir.path().join("dotfiles"), "dotfiles", &work.id)?;

    let data = fs::read_to_string(dir.path().join("repositories.toml"))?;
    assert!(data.contains("[[repository]]"));
    let data = fs::read_to_string(dir.path().join("accounts.toml"))?;
    assert!(data.contains("[[account]]"));
    assert!(!data.contains("gpg_key_id"));

    Ok(())
}

#[test]
fn malformed_store_loads_empty() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("accounts.toml"), "this is not [[toml")?;

    let mut accounts = AccountStore::open_in(dir.path())?;
    assert!(accounts.is_empty());
    assert!(matches!(
        accounts.update("missing", draft("work", &dir.path().join("id_work"))),
        Err(StoreError::NotFound(_))
    ));

    Ok(())
}

#[test]
fn hand_written_store_is_readable() -> Result<()> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("accounts.toml"),
        indoc! {r#"
            [[account]]
            id = "1"
            alias = "work"
            username = "John Doe"
            email = "john@work.com"
            ssh_key_path = "/home/john/.ssh/id_work"
            gpg_key_id = "ABCDEF0123456789"
        "#},
    )?;

    let accounts = AccountStore::open_in(dir.path())?;
    let work = accounts
        .resolve("work")
        .ok_or_else(|| anyhow::anyhow!("account not loaded"))?;
    assert_eq!(work.id, "1");
    assert_eq!(work.gpg_key_id.as_deref(), Some("ABCDEF0123456789"));

    Ok(())
}

#[test]
fn ssh_config_rewrite_keeps_other_hosts_and_backs_up() -> Result<()> {
    let dir = tempdir()?;
    let key = dir.path().join("id_work");
    fs::write(&key, "secret")?;
    let config = dir.path().join(".ssh").join("config");
    fs::create_dir_all(dir.path().join(".ssh"))?;
    let before = indoc! {"
        Host gitlab.com
            IdentityFile ~/.ssh/id_lab

        Host github.com
            IdentityFile ~/.ssh/id_old
            User git
    "};
    fs::write(&config, before)?;
    let drafter = SshConfigDrafter::new(&config);

    drafter.replace_block(&HostBlock::new("github.com", &key))?;

    let expect = formatdoc! {"
        Host gitlab.com
            IdentityFile ~/.ssh/id_lab

        Host github.com
            HostName github.com
            User git
            IdentityFile {}
            IdentitiesOnly yes
    ", key.display()};
    assert_eq!(fs::read_to_string(&config)?, expect);
    assert_eq!(fs::read_to_string(drafter.backup_path())?, before);
    assert_eq!(drafter.find_identity_for_host("github.com")?, Some(key));

    Ok(())
}

#[test]
fn settings_file_overrides_defaults() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        formatdoc! {r#"
            host = "git.example.com"
            store_dir = "{}"
        "#, dir.path().join("store").display()},
    )?;

    let settings = Settings::load(&path)?;
    assert_eq!(settings.host(), "git.example.com");
    assert_eq!(settings.store_dir()?, dir.path().join("store"));

    let missing = Settings::load(dir.path().join("missing.toml"))?;
    assert_eq!(missing.host(), "github.com");

    Ok(())
}

#[test]
fn bind_pins_local_identity() -> Result<()> {
    if !has_git() {
        return Ok(());
    }

    let dir = tempdir()?;
    let key = dir.path().join("id_work");
    fs::write(&key, "secret")?;
    let fixture = RepoFixture::new(dir.path().join("dotfiles"))?;
    let workdir = fixture.workdir()?;

    let mut accounts = AccountStore::open_in(dir.path())?;
    let work = accounts.add(draft("work", &key))?;
    let mut repositories = RepositoryStore::open_in(dir.path())?;
    let switcher: Switcher = Switcher::new(
        Gateway::default(),
        SshConfigDrafter::new(dir.path().join(".ssh").join("config")),
        "github.com",
    );

    let binding = switcher.bind(&mut repositories, &workdir, "dotfiles", &work)?;

    assert_eq!(binding.account_id, work.id);
    assert_eq!(fixture.local_str("user.name")?, "John Doe");
    assert_eq!(fixture.local_str("user.email")?, "work@doe.com");
    assert_eq!(
        fixture.local_str("core.sshCommand")?,
        format!(
            "ssh -i \"{}\" -o IdentitiesOnly=yes -F /dev/null",
            key.display()
        )
    );
    assert_eq!(RepositoryStore::open_in(dir.path())?.len(), 1);

    switcher.unbind(&mut repositories, &workdir)?;
    assert!(RepositoryStore::open_in(dir.path())?.is_empty());
    assert_eq!(fixture.local_str("user.email")?, "work@doe.com");

    Ok(())
}

#[test]
fn cli_manages_accounts_and_bindings() -> Result<()> {
    if !has_git() {
        return Ok(());
    }

    let dir = tempdir()?;
    let key = dir.path().join("id_work");
    fs::write(&key, "secret")?;
    let fixture = RepoFixture::new(dir.path().join("dotfiles"))?;
    let settings = dir.path().join("config.toml");
    fs::write(
        &settings,
        formatdoc! {r#"
            store_dir = "{}"
            ssh_config = "{}"
        "#, dir.path().join("store").display(), dir.path().join("ssh_config").display()},
    )?;

    let gitpersona = |args: &[&str]| -> Result<std::process::Output> {
        Ok(Command::new(env!("CARGO_BIN_EXE_gitpersona"))
            .arg("--config")
            .arg(&settings)
            .args(args)
            .output()?)
    };

    let key_arg = key.to_string_lossy().into_owned();
    let output = gitpersona(&[
        "add", "--alias", "work", "--username", "John Doe", "--email", "work@doe.com", "--key",
        &key_arg,
    ])?;
    assert!(output.status.success());

    let output = gitpersona(&[
        "add", "--alias", "broken", "--username", "John", "--email", "", "--key", &key_arg,
    ])?;
    assert!(!output.status.success());

    let output = gitpersona(&["list"])?;
    assert!(output.status.success());
    let listing = String::from_utf8_lossy(&output.stdout);
    assert!(listing.contains("work (John Doe <work@doe.com>)"));
    assert!(!listing.contains("broken"));

    let workdir = fixture.workdir()?.to_string_lossy().into_owned();
    let output = gitpersona(&["repo", "bind", &workdir, "work"])?;
    assert!(output.status.success());
    assert_eq!(fixture.local_str("user.email")?, "work@doe.com");

    let output = gitpersona(&["remove", "work"])?;
    assert!(output.status.success());

    let output = gitpersona(&["repo", "list"])?;
    let listing = String::from_utf8_lossy(&output.stdout);
    assert!(listing.contains("bound to: Unknown"));

    Ok(())
}

#[test]
fn cli_stores_relative_key_as_absolute() -> Result<()> {
    if !has_git() {
        return Ok(());
    }

    let dir = tempdir()?;
    let keys = dir.path().join("keys");
    let elsewhere = dir.path().join("elsewhere");
    fs::create_dir_all(&keys)?;
    fs::create_dir_all(&elsewhere)?;
    fs::write(keys.join("id_work"), "secret")?;
    let global = dir.path().join(".gitconfig");
    fs::write(&global, "")?;
    let ssh_config = dir.path().join("ssh_config");
    let settings = dir.path().join("config.toml");
    fs::write(
        &settings,
        formatdoc! {r#"
            store_dir = "{}"
            ssh_config = "{}"
        "#, dir.path().join("store").display(), ssh_config.display()},
    )?;

    // Global git configuration stays inside the scratch directory.
    let gitpersona = |cwd: &Path, args: &[&str]| -> Result<std::process::Output> {
        Ok(Command::new(env!("CARGO_BIN_EXE_gitpersona"))
            .current_dir(cwd)
            .env("HOME", dir.path())
            .env("GIT_CONFIG_GLOBAL", &global)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .arg("--config")
            .arg(&settings)
            .args(args)
            .output()?)
    };

    let output = gitpersona(
        &keys,
        &[
            "add", "--alias", "work", "--username", "John Doe", "--email", "work@doe.com", "--key",
            "id_work",
        ],
    )?;
    assert!(output.status.success());

    let output = gitpersona(&elsewhere, &["use", "work"])?;
    assert!(output.status.success());

    let stored = AccountStore::open_in(dir.path().join("store"))?;
    let work = stored
        .resolve("work")
        .ok_or_else(|| anyhow::anyhow!("account not stored"))?;
    let key = keys.canonicalize()?.join("id_work");
    assert_eq!(work.ssh_key_path, key);
    assert_eq!(
        SshConfigDrafter::new(&ssh_config).find_identity_for_host("github.com")?,
        Some(key)
    );
    assert_eq!(git2::Config::open(&global)?.get_string("user.email")?, "work@doe.com");

    Ok(())
}
