// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use gitpersona::{
    config::Settings,
    gateway::{is_authenticated, keygen::suggest_key_filename},
    identity::import::AuthSource,
    model::folder_alias,
    path::{default_settings_path, default_ssh_dir},
    sshconfig::SshConfigDrafter,
    Account, AccountDraft, AccountStore, Gateway, Identity, RepositoryStore, Switcher,
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, Password, Text};
use std::{
    path::{Path, PathBuf},
    process::exit,
    time::Duration,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "gitpersona [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to settings file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let settings_path = match self.config {
            Some(path) => path,
            None => default_settings_path()?,
        };
        let app = App::new(Settings::load(settings_path)?)?;

        match self.command {
            Command::Add(opts) => app.run_add(opts),
            Command::Edit(opts) => app.run_edit(opts),
            Command::Remove(opts) => app.run_remove(opts),
            Command::List => app.run_list(),
            Command::Use(opts) => app.run_use(opts),
            Command::Status => app.run_status(),
            Command::Import => app.run_import(),
            Command::Test => app.run_test(),
            Command::Keygen(command) => app.run_keygen(command),
            Command::Repo(command) => app.run_repo(command),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Add new account.
    #[command(override_usage = "gitpersona add [options] --alias <alias> --username <name> --email <email> --key <path>")]
    Add(AddOptions),

    /// Edit existing account.
    #[command(override_usage = "gitpersona edit [options] <account>")]
    Edit(EditOptions),

    /// Remove account.
    #[command(override_usage = "gitpersona remove <account>")]
    Remove(AccountTarget),

    /// List accounts.
    List,

    /// Make account the active identity of this machine.
    #[command(override_usage = "gitpersona use <account>")]
    Use(AccountTarget),

    /// Show active identity.
    Status,

    /// Add account from the identity currently in use.
    Import,

    /// Check which account the code-hosting service sees.
    Test,

    /// Generate new keys.
    #[command(subcommand)]
    Keygen(KeygenCommand),

    /// Pin repositories to accounts.
    #[command(subcommand)]
    Repo(RepoCommand),
}

#[derive(Args, Clone, Debug)]
struct AddOptions {
    /// Name to refer to the account by.
    #[arg(short, long, value_name = "alias")]
    pub alias: String,

    /// Value for git user.name.
    #[arg(short, long, value_name = "name")]
    pub username: String,

    /// Value for git user.email.
    #[arg(short, long, value_name = "email")]
    pub email: String,

    /// Private SSH key to authenticate with.
    #[arg(short, long, value_name = "path")]
    pub key: PathBuf,

    /// GPG key id to sign commits with.
    #[arg(short, long, value_name = "key_id")]
    pub gpg: Option<String>,
}

#[derive(Args, Clone, Debug)]
struct EditOptions {
    /// Id or alias of account.
    #[arg(value_name = "account")]
    pub account: String,

    /// New alias.
    #[arg(short, long, value_name = "alias")]
    pub alias: Option<String>,

    /// New git user.name.
    #[arg(short, long, value_name = "name")]
    pub username: Option<String>,

    /// New git user.email.
    #[arg(short, long, value_name = "email")]
    pub email: Option<String>,

    /// New private SSH key.
    #[arg(short, long, value_name = "path")]
    pub key: Option<PathBuf>,

    /// New GPG key id.
    #[arg(short, long, value_name = "key_id", conflicts_with = "no_gpg")]
    pub gpg: Option<String>,

    /// Stop signing commits.
    #[arg(long)]
    pub no_gpg: bool,
}

#[derive(Args, Clone, Debug)]
struct AccountTarget {
    /// Id or alias of account.
    #[arg(value_name = "account")]
    pub account: String,
}

#[derive(Debug, Clone, Subcommand)]
enum KeygenCommand {
    /// Generate ed25519 SSH key.
    #[command(override_usage = "gitpersona keygen ssh [options] --email <email>")]
    Ssh(SshKeygenOptions),

    /// Generate GPG signing key.
    #[command(override_usage = "gitpersona keygen gpg --name <name> --email <email>")]
    Gpg(GpgKeygenOptions),
}

#[derive(Args, Clone, Debug)]
struct SshKeygenOptions {
    /// Email to comment key with.
    #[arg(short, long, value_name = "email")]
    pub email: String,

    /// Alias to derive key filename from.
    #[arg(short, long, value_name = "alias")]
    pub alias: Option<String>,

    /// Key filename.
    #[arg(short, long, value_name = "filename", conflicts_with = "alias")]
    pub filename: Option<String>,

    /// Directory to place key in.
    #[arg(short, long, value_name = "path")]
    pub dir: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
struct GpgKeygenOptions {
    /// Real name of key owner.
    #[arg(short, long, value_name = "name")]
    pub name: String,

    /// Email of key owner.
    #[arg(short, long, value_name = "email")]
    pub email: String,
}

#[derive(Debug, Clone, Subcommand)]
enum RepoCommand {
    /// Pin repository to account.
    #[command(override_usage = "gitpersona repo bind [options] <path> <account>")]
    Bind(BindOptions),

    /// Stop managing repository, leaving its git configuration as is.
    #[command(override_usage = "gitpersona repo unbind <path>")]
    Unbind(UnbindOptions),

    /// List bound repositories.
    List,
}

#[derive(Args, Clone, Debug)]
struct BindOptions {
    /// Repository working directory.
    #[arg(value_name = "path")]
    pub path: PathBuf,

    /// Id or alias of account.
    #[arg(value_name = "account")]
    pub account: String,

    /// Display name, defaults to folder name.
    #[arg(short, long, value_name = "alias")]
    pub alias: Option<String>,
}

#[derive(Args, Clone, Debug)]
struct UnbindOptions {
    /// Repository working directory.
    #[arg(value_name = "path")]
    pub path: PathBuf,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

struct App {
    settings: Settings,
    switcher: Switcher,
}

impl App {
    fn new(settings: Settings) -> Result<Self> {
        let switcher = Switcher::new(
            Gateway::default(),
            SshConfigDrafter::new(settings.ssh_config()?),
            settings.host(),
        );

        Ok(Self { settings, switcher })
    }

    fn accounts(&self) -> Result<AccountStore> {
        Ok(AccountStore::open_in(self.settings.store_dir()?)?)
    }

    fn repositories(&self) -> Result<RepositoryStore> {
        Ok(RepositoryStore::open_in(self.settings.store_dir()?)?)
    }

    fn run_add(&self, opts: AddOptions) -> Result<()> {
        let draft = AccountDraft {
            alias: opts.alias,
            username: opts.username,
            email: opts.email,
            ssh_key_path: absolute_key_path(&opts.key)?,
            gpg_key_id: opts.gpg,
        }
        .normalized();
        draft.validate()?;

        let account = self.accounts()?.add(draft)?;
        info!("added account {:?} with id {}", account.alias, account.id);

        Ok(())
    }

    fn run_edit(&self, opts: EditOptions) -> Result<()> {
        let mut accounts = self.accounts()?;
        let account = resolve(&accounts, &opts.account)?.clone();

        let mut draft = account.to_draft();
        if let Some(alias) = opts.alias {
            draft.alias = alias;
        }
        if let Some(username) = opts.username {
            draft.username = username;
        }
        if let Some(email) = opts.email {
            draft.email = email;
        }
        if let Some(key) = opts.key {
            draft.ssh_key_path = absolute_key_path(&key)?;
        }
        if opts.no_gpg {
            draft.gpg_key_id = None;
        } else if let Some(gpg) = opts.gpg {
            draft.gpg_key_id = Some(gpg);
        }

        let draft = draft.normalized();
        draft.validate()?;
        accounts.update(&account.id, draft)?;
        info!("updated account {:?}", account.alias);

        Ok(())
    }

    fn run_remove(&self, opts: AccountTarget) -> Result<()> {
        let mut accounts = self.accounts()?;
        let id = resolve(&accounts, &opts.account)?.id.clone();
        let account = accounts.delete(&id)?;
        info!("removed account {:?}", account.alias);

        let dangling = self
            .repositories()?
            .records()
            .iter()
            .filter(|binding| binding.account_id == id)
            .count();
        if dangling > 0 {
            warn!("{dangling} repositories are still bound to removed account");
        }

        Ok(())
    }

    fn run_list(&self) -> Result<()> {
        let accounts = self.accounts()?;
        if accounts.is_empty() {
            info!("no accounts yet, add one with `gitpersona add` or `gitpersona import`");
            return Ok(());
        }

        let active_email = self
            .switcher
            .gateway()
            .current_global_user()?
            .map(|user| user.email);
        for account in accounts.records() {
            let marker = if active_email.as_deref() == Some(account.email.as_str()) {
                "*"
            } else {
                " "
            };
            println!("{marker} {}", describe(account));
        }

        Ok(())
    }

    fn run_use(&self, opts: AccountTarget) -> Result<()> {
        let accounts = self.accounts()?;
        let account = resolve(&accounts, &opts.account)?;
        let message = self.switcher.activate(&Identity::from(account))?;
        info!("{message}");

        Ok(())
    }

    fn run_status(&self) -> Result<()> {
        match self.switcher.gateway().current_global_user()? {
            Some(user) => println!("user:         {} <{}>", user.name, user.email),
            None => println!("user:         <not configured>"),
        }

        match self
            .switcher
            .ssh_config()
            .find_identity_for_host(self.switcher.host())?
        {
            Some(path) => println!("identity:     {}", path.display()),
            None => println!("identity:     <no IdentityFile for {}>", self.switcher.host()),
        }

        if let Some(helper) = self.switcher.gateway().credential_helper()? {
            println!("credentials:  {helper}");
        }

        Ok(())
    }

    fn run_import(&self) -> Result<()> {
        let mut accounts = self.accounts()?;
        let current = self.switcher.import_current(&accounts)?;

        if let Some(id) = &current.matched_account {
            let alias = accounts.get(id).map(|account| account.alias.as_str());
            info!("current identity already stored as {:?}", alias.unwrap_or(id));
            return Ok(());
        }

        let ssh_key_path = match current.source {
            AuthSource::Ssh(path) => path,
            AuthSource::Https => {
                let proceed = Confirm::new(
                    "current identity authenticates over HTTPS, generate an SSH key for it?",
                )
                .with_default(true)
                .prompt()?;
                if !proceed {
                    return Ok(());
                }

                let alias = Text::new("alias").with_default(&current.username).prompt()?;
                let key = self.switcher.gateway().generate_ssh_key(
                    &current.email,
                    &suggest_key_filename(&alias),
                    &self.settings.keys_dir()?,
                )?;
                show_public_key("SSH", &key.public_key);

                return self.import_as(
                    &mut accounts,
                    alias,
                    &current.username,
                    &current.email,
                    key.private_key,
                );
            }
            AuthSource::Unknown => {
                warn!(
                    "no IdentityFile for {} found in {:?}",
                    self.switcher.host(),
                    self.switcher.ssh_config().config_path().display()
                );
                let fallback = default_ssh_dir()?.join("id_rsa");
                let use_fallback = Confirm::new(&format!("use {} instead?", fallback.display()))
                    .with_default(true)
                    .prompt()?;
                if use_fallback {
                    fallback
                } else {
                    absolute_key_path(Text::new("path to ssh key").prompt()?)?
                }
            }
        };

        self.import_as(
            &mut accounts,
            "Current Profile".into(),
            &current.username,
            &current.email,
            ssh_key_path,
        )
    }

    fn import_as(
        &self,
        accounts: &mut AccountStore,
        alias: String,
        username: &str,
        email: &str,
        ssh_key_path: PathBuf,
    ) -> Result<()> {
        let draft = AccountDraft {
            alias,
            username: username.into(),
            email: email.into(),
            ssh_key_path: absolute_key_path(&ssh_key_path)?,
            gpg_key_id: None,
        }
        .normalized();
        draft.validate()?;

        let account = accounts.add(draft)?;
        info!("imported account {:?} with id {}", account.alias, account.id);

        Ok(())
    }

    fn run_test(&self) -> Result<()> {
        let bar = spinner(format!("connecting to git@{}", self.switcher.host()))?;
        let greeting = self.switcher.test_connection();
        bar.finish_and_clear();

        let greeting = greeting?;
        if is_authenticated(&greeting) {
            info!("{greeting}");
            Ok(())
        } else {
            bail!("connection issue:\n{greeting}")
        }
    }

    fn run_keygen(&self, command: KeygenCommand) -> Result<()> {
        match command {
            KeygenCommand::Ssh(opts) => {
                let filename = match (opts.filename, opts.alias) {
                    (Some(filename), _) => filename,
                    (None, Some(alias)) => suggest_key_filename(&alias),
                    (None, None) => suggest_key_filename(&opts.email),
                };
                let dir = match opts.dir {
                    Some(dir) => dir,
                    None => self.settings.keys_dir()?,
                };

                let key = self
                    .switcher
                    .gateway()
                    .generate_ssh_key(&opts.email, &filename, &dir)?;
                info!("private key written to {:?}", key.private_key.display());
                show_public_key("SSH", &key.public_key);
            }
            KeygenCommand::Gpg(opts) => {
                let passphrase = Password::new("passphrase to protect gpg key")
                    .with_custom_confirmation_message("confirm passphrase")
                    .prompt()?;

                let bar = spinner(format!("generating gpg key for {}", opts.email))?;
                let key = self
                    .switcher
                    .gateway()
                    .generate_gpg_key(&opts.name, &opts.email, &passphrase);
                bar.finish_and_clear();

                let key = key?;
                info!("gpg key id: {}", key.key_id);
                show_public_key("GPG", &key.public_key);
            }
        }

        Ok(())
    }

    fn run_repo(&self, command: RepoCommand) -> Result<()> {
        let mut repositories = self.repositories()?;
        match command {
            RepoCommand::Bind(opts) => {
                let path = opts
                    .path
                    .canonicalize()
                    .with_context(|| format!("cannot resolve {:?}", opts.path.display()))?;
                let accounts = self.accounts()?;
                let account = resolve(&accounts, &opts.account)?;
                let alias = opts.alias.unwrap_or_else(|| folder_alias(&path));

                let binding = self.switcher.bind(&mut repositories, &path, alias, account)?;
                info!("repository {:?} is now bound to {}", binding.alias, account.alias);
            }
            RepoCommand::Unbind(opts) => {
                let path = opts.path.canonicalize().unwrap_or(opts.path);
                let binding = self.switcher.unbind(&mut repositories, &path)?;
                info!(
                    "stopped managing {:?}, its git configuration is left as is",
                    binding.alias
                );
            }
            RepoCommand::List => {
                if repositories.is_empty() {
                    info!("no repositories managed yet");
                    return Ok(());
                }

                let accounts = self.accounts()?;
                for binding in repositories.records() {
                    let owner = accounts
                        .get(&binding.account_id)
                        .map(|account| account.alias.as_str())
                        .unwrap_or("Unknown");
                    println!(
                        "{}  {}  bound to: {owner}",
                        binding.alias,
                        binding.path.display()
                    );
                }
            }
        }

        Ok(())
    }
}

fn resolve<'a>(accounts: &'a AccountStore, id_or_alias: &str) -> Result<&'a Account> {
    accounts
        .resolve(id_or_alias)
        .ok_or_else(|| anyhow!("no account with id or alias {id_or_alias:?}"))
}

/// Expand `~` and anchor key path at the current directory, so the stored
/// account works from anywhere.
fn absolute_key_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref().to_string_lossy();
    if path.trim().is_empty() {
        return Ok(PathBuf::new());
    }

    let expanded = PathBuf::from(shellexpand::tilde(&path).into_owned());
    std::path::absolute(&expanded)
        .with_context(|| format!("cannot resolve {:?}", expanded.display()))
}

fn describe(account: &Account) -> String {
    let mut line = format!(
        "{} ({} <{}>) key={}",
        account.alias,
        account.username,
        account.email,
        account.ssh_key_path.display()
    );
    if let Some(gpg) = &account.gpg_key_id {
        line.push_str(&format!(" gpg={gpg}"));
    }

    line
}

fn show_public_key(kind: &str, public_key: &str) {
    info!("add this public key to your account (Settings -> SSH and GPG keys -> New {kind} key):");
    println!("{}", public_key.trim_end());
}

fn spinner(message: String) -> Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{elapsed_precise:.green}  {spinner:.yellow}  {msg}")?;
    bar.set_style(style);
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    Ok(bar)
}
