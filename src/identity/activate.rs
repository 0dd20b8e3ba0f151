// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Identity activation.

use crate::{
    gateway::GatewayError,
    identity::{Identity, Switcher},
    sshconfig::{HostBlock, SshConfigError},
    syscall::Syscall,
};

use tracing::{info, instrument};

impl<S> Switcher<S>
where
    S: Syscall,
{
    /// Make identity the machine-wide default.
    ///
    /// Sets the global git identity, then points the managed host's block in
    /// the SSH client configuration at the identity's key. Stops at the first
    /// failing step without undoing earlier ones.
    ///
    /// # Errors
    ///
    /// - Return [`ActivateError::GlobalIdentity`] if global git identity
    ///   cannot be set. SSH client configuration is left untouched.
    /// - Return [`ActivateError::SshConfig`] if SSH client configuration cannot
    ///   be rewritten. Global git identity stays applied.
    #[instrument(skip(self, identity), level = "debug")]
    pub fn activate(&self, identity: &Identity) -> Result<String> {
        self.gateway
            .set_global_identity(
                &identity.name,
                &identity.email,
                identity.gpg_key_id.as_deref(),
            )
            .map_err(ActivateError::GlobalIdentity)?;

        self.ssh_config
            .replace_block(&HostBlock::new(&self.host, &identity.ssh_key_path))
            .map_err(ActivateError::SshConfig)?;

        let message = format!("switched to {} ({})", identity.name, identity.email);
        info!("{message}");

        Ok(message)
    }
}

/// Stage of activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivateStage {
    GlobalIdentity,
    SshConfig,
}

/// Activation error types.
#[derive(Debug, thiserror::Error)]
pub enum ActivateError {
    /// Global git identity cannot be set.
    #[error("activation failed while setting global git identity")]
    GlobalIdentity(#[source] GatewayError),

    /// SSH client configuration cannot be rewritten.
    #[error("activation failed while updating ssh config (global git identity already applied)")]
    SshConfig(#[source] SshConfigError),
}

impl ActivateError {
    /// Stage that failed.
    pub fn stage(&self) -> ActivateStage {
        match self {
            Self::GlobalIdentity(_) => ActivateStage::GlobalIdentity,
            Self::SshConfig(_) => ActivateStage::SshConfig,
        }
    }
}

/// Friendly result alias :3
type Result<T, E = ActivateError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gateway::Gateway,
        sshconfig::SshConfigDrafter,
        syscall::{
            testing::{Reply, ScriptedSyscall},
            ProcessOutput,
        },
    };
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    fn identity(key: &str) -> Identity {
        Identity {
            name: "John Doe".into(),
            email: "john@doe.com".into(),
            ssh_key_path: key.into(),
            gpg_key_id: None,
        }
    }

    fn switcher(replies: impl IntoIterator<Item = Reply>) -> Switcher<ScriptedSyscall> {
        Switcher::new(
            Gateway::new(ScriptedSyscall::new(replies)),
            SshConfigDrafter::new(".ssh/config"),
            "github.com",
        )
    }

    #[sealed_test]
    fn activation_applies_git_then_ssh() -> anyhow::Result<()> {
        std::fs::write("id_work", "secret")?;
        let switcher = switcher([]);

        let message = switcher.activate(&identity("id_work"))?;

        assert_eq!(message, "switched to John Doe (john@doe.com)");
        assert_eq!(switcher.gateway().syscall().calls().len(), 4);
        assert_eq!(
            switcher.ssh_config().find_identity_for_host("github.com")?,
            Some("id_work".into())
        );

        Ok(())
    }

    #[sealed_test]
    fn activation_short_circuits_on_git_failure() -> anyhow::Result<()> {
        std::fs::write("id_work", "secret")?;
        let switcher = switcher([Reply::Output(ProcessOutput::failed(
            "error: could not lock config file",
        ))]);

        let result = switcher.activate(&identity("id_work"));

        let err = result.err().ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert_eq!(err.stage(), ActivateStage::GlobalIdentity);
        assert_eq!(switcher.gateway().syscall().calls().len(), 1);
        assert!(!switcher.ssh_config().config_path().exists());

        Ok(())
    }

    #[sealed_test]
    fn activation_reports_ssh_stage() -> anyhow::Result<()> {
        let switcher = switcher([]);

        let result = switcher.activate(&identity("id_missing"));

        let err = result.err().ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert_eq!(err.stage(), ActivateStage::SshConfig);
        assert!(matches!(
            err,
            ActivateError::SshConfig(SshConfigError::MissingIdentityFile { .. })
        ));
        assert_eq!(switcher.gateway().syscall().calls().len(), 4);

        Ok(())
    }
}
