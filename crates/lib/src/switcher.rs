//! Host-level switching
//!
//! The [`Switcher`] is what the CLI talks to. It resolves aliases through the
//! identity registry, assembles a [`Transaction`] with the steps the target
//! needs, runs it under the switch lock, and moves the current-identity
//! pointer only when the transaction reports [`FinalState::Switched`].

use std::{path::PathBuf, sync::Arc};

use serde::Serialize;

use crate::{
    Identity, Result,
    clock::{Clock, SystemClock},
    config::{Config, DataDir},
    env::{EnvFile, EnvVars, EnvironmentConfigurator},
    git::{ConfigScope, GitCli, GitConfigWriter},
    identity::{IdentityRegistry, JsonRegistry},
    ssh::{AgentIsolationManager, OpenSshAgent, SshIsolationManager},
    state::{State, StateFile, SwitchLock, SwitchRecord},
    token::{GitHubTokenValidator, TokenIsolationStore, TokenVaultStore},
    transaction::{
        EnvironmentStep, FinalState, GitConfigurationStep, SshIsolationStep, TokenIsolationStep,
        Transaction, TransactionOptions, TransactionResult, ValidationStep,
    },
};

/// What to switch to, and how.
#[derive(Clone, Debug)]
pub struct SwitchRequest {
    pub target: String,
    pub scope: ConfigScope,
    pub options: TransactionOptions,
    /// Only run precondition checks
    pub validate_only: bool,
}

impl SwitchRequest {
    pub fn new(target: impl Into<String>, options: TransactionOptions) -> Self {
        Self {
            target: target.into(),
            scope: ConfigScope::Global,
            options,
            validate_only: false,
        }
    }

    pub fn with_scope(mut self, scope: ConfigScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn validate_only(mut self) -> Self {
        self.validate_only = true;
        self
    }
}

/// Snapshot for `gitswitch status`.
#[derive(Clone, Debug, Serialize)]
pub struct Status {
    pub state: State,
    pub current: Option<Identity>,
    pub active_token: Option<String>,
    pub exports: Option<EnvVars>,
}

pub struct Switcher {
    registry: Arc<dyn IdentityRegistry>,
    state: StateFile,
    lock_path: PathBuf,
    tokens: Arc<dyn TokenIsolationStore>,
    ssh: Arc<dyn SshIsolationManager>,
    git: Arc<dyn GitConfigWriter>,
    env: Arc<dyn EnvironmentConfigurator>,
    clock: Arc<dyn Clock>,
}

impl Switcher {
    /// Assemble a switcher from explicit collaborators. The lock file lives
    /// next to the state file.
    pub fn new(
        registry: Arc<dyn IdentityRegistry>,
        state: StateFile,
        tokens: Arc<dyn TokenIsolationStore>,
        ssh: Arc<dyn SshIsolationManager>,
        git: Arc<dyn GitConfigWriter>,
        env: Arc<dyn EnvironmentConfigurator>,
    ) -> Self {
        let lock_path = state.path().with_file_name(crate::constants::LOCK_FILE);
        Self {
            registry,
            state,
            lock_path,
            tokens,
            ssh,
            git,
            env,
            clock: Arc::new(SystemClock),
        }
    }

    /// The OS-backed switcher for `data_dir`.
    pub async fn open(data_dir: &DataDir, config: &Config) -> Result<Self> {
        let registry = JsonRegistry::open(data_dir.accounts()).await?;
        let mut tokens = TokenVaultStore::open(data_dir.tokens()).await?;
        if config.validate_tokens_online {
            let validator =
                GitHubTokenValidator::with_base_url(config.api_url.clone(), config.command_timeout)?;
            tokens = tokens.with_validator(Arc::new(validator));
        }
        let ssh = AgentIsolationManager::new(
            Arc::new(OpenSshAgent::new(config.command_timeout)),
            data_dir.agents(),
            config.ssh.clone(),
        );
        Ok(Self::new(
            Arc::new(registry),
            StateFile::new(data_dir.state()),
            Arc::new(tokens),
            Arc::new(ssh),
            Arc::new(GitCli::new(config.command_timeout)),
            Arc::new(EnvFile::new(data_dir.env_file())),
        ))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &Arc<dyn IdentityRegistry> {
        &self.registry
    }

    pub fn tokens(&self) -> &Arc<dyn TokenIsolationStore> {
        &self.tokens
    }

    pub fn environment(&self) -> &Arc<dyn EnvironmentConfigurator> {
        &self.env
    }

    pub fn state_file(&self) -> &StateFile {
        &self.state
    }

    /// Build the transaction for `target`.
    ///
    /// Token and SSH steps are left out for identities that opt out of that
    /// isolation; the rest always run. The SSH step still runs when only the
    /// source uses an agent, so that agent gets stopped.
    pub fn transaction(
        &self,
        source: Option<Identity>,
        target: Identity,
        scope: ConfigScope,
        options: TransactionOptions,
    ) -> Result<Transaction> {
        let needs_token = target.requires_token_isolation;
        let needs_ssh = target.requires_ssh_isolation
            || source.as_ref().is_some_and(|s| s.requires_ssh_isolation);
        let mut tx = Transaction::new(source, target, self.tokens.clone(), self.ssh.clone(), options)?
            .with_clock(self.clock.clone());
        if needs_token {
            tx.add_step(TokenIsolationStep::new())?;
        }
        if needs_ssh {
            tx.add_step(SshIsolationStep::new())?;
        }
        tx.add_step(GitConfigurationStep::new(self.git.clone(), scope))?
            .add_step(EnvironmentStep::new(self.env.clone()))?
            .add_step(ValidationStep::new())?;
        Ok(tx)
    }

    /// The current identity, if the pointer names one that still exists.
    pub async fn current(&self) -> Result<Option<Identity>> {
        let Some(alias) = self.state.load().await?.current else {
            return Ok(None);
        };
        match self.registry.get(&alias).await {
            Ok(identity) => Ok(Some(identity)),
            Err(e) if e.is_not_found() => {
                tracing::warn!(alias, "Current identity no longer exists in the registry");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Run (or only validate) a switch.
    ///
    /// Errors are reserved for problems outside the transaction: unknown
    /// alias, lock held, unreadable state. A failed switch is an `Ok` result
    /// whose `final_state` says what happened.
    pub async fn switch(&self, request: SwitchRequest) -> Result<TransactionResult> {
        let target = self.registry.get(&request.target).await?;

        if request.validate_only {
            let source = self.current().await?;
            let tx = self.transaction(source, target, request.scope, request.options)?;
            return Ok(tx.validate_only().await);
        }

        let _lock = SwitchLock::acquire(&self.lock_path).await?;
        let source = self.current().await?;
        let tx = self.transaction(source, target, request.scope, request.options)?;
        let result = tx.execute().await;

        if result.final_state == FinalState::Switched {
            let record = SwitchRecord {
                transaction_id: result.transaction_id,
                at: self.clock.now(),
                from: result.source.clone(),
                to: result.target.clone(),
            };
            if let Err(e) = self.state.record_switch(record).await {
                tracing::error!(tx_id = %result.transaction_id, error = %e, "Switched, but failed to record current identity");
                return Err(e);
            }
        }
        Ok(result)
    }

    pub async fn status(&self) -> Result<Status> {
        Ok(Status {
            state: self.state.load().await?,
            current: self.current().await?,
            active_token: self.tokens.active_alias().await?,
            exports: self.env.read().await?,
        })
    }

    /// Remove an identity, its token, and the pointer if it was current.
    pub async fn remove_identity(&self, alias: &str) -> Result<Identity> {
        let _lock = SwitchLock::acquire(&self.lock_path).await?;
        let removed = self.registry.remove(alias).await?;
        match self.tokens.remove_token(alias).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        if self.state.load().await?.current.as_deref() == Some(alias) {
            self.state.clear_current().await?;
        }
        tracing::info!(alias, "Removed identity");
        Ok(removed)
    }
}
