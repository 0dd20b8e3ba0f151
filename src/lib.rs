// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Switch between git identities in one step.
//!
//! Gitpersona keeps a list of named __accounts__ (name, email, SSH key, and
//! optionally a GPG signing key), and makes one of them the active git
//! identity of the machine by rewriting the global git configuration and the
//! user's SSH client configuration. Individual repositories can be __bound__
//! to an account, which pins their local git configuration to it no matter
//! which account is active.

pub mod config;
pub mod gateway;
pub mod identity;
pub mod model;
pub mod path;
pub mod sshconfig;
pub mod store;
pub mod syscall;

pub use config::Settings;
pub use gateway::Gateway;
pub use identity::{Identity, Switcher};
pub use model::{Account, AccountDraft, RepositoryBinding};
pub use store::{AccountStore, RepositoryStore};
