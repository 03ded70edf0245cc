use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use base64ct::{Base64, Encoding};
use gitswitch::{
    Clock, FixedClock, Identity, Switcher,
    config::DataDir,
    env::EnvFile,
    git::MemoryGitConfig,
    identity::{IdentityRegistry, JsonRegistry},
    ssh::{AgentIsolationManager, MemoryAgent, SshIsolationConfig, fingerprint::public_key_path},
    state::StateFile,
    token::{Token, TokenIsolationStore, TokenMetadata, TokenType, TokenVaultStore},
};

/// Write a fake private key and a parseable `.pub` next to it.
pub fn write_key_pair(dir: &Path, name: &str) -> PathBuf {
    let key = dir.join(name);
    std::fs::write(&key, "PRIVATE KEY").unwrap();
    let blob = Base64::encode_string(format!("{name}-public").as_bytes());
    std::fs::write(public_key_path(&key), format!("ssh-ed25519 {blob} {name}\n")).unwrap();
    key
}

/// A switcher over a temporary data directory.
///
/// Registry, state, token vault and env file are real files; the SSH agent
/// and Git config are in memory.
pub struct TestEnv {
    pub dir: tempfile::TempDir,
    pub data: DataDir,
    pub switcher: Switcher,
    pub agent: Arc<MemoryAgent>,
    pub git: Arc<MemoryGitConfig>,
    pub tokens: Arc<TokenVaultStore>,
    pub clock: Arc<FixedClock>,
    pub work: Identity,
    pub personal: Identity,
}

impl TestEnv {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data = DataDir::new(dir.path().join("data"));
        let keys = dir.path().join("keys");
        std::fs::create_dir_all(&keys).unwrap();

        let work = Identity::new("work", "Jane Doe", "jane@corp.example", "jdoe-corp")
            .with_ssh_key(write_key_pair(&keys, "id_work"));
        let personal = Identity::new("personal", "Jane Doe", "jane@home.example", "janedoe")
            .with_ssh_key(write_key_pair(&keys, "id_personal"));

        let registry = JsonRegistry::open(data.accounts()).await.unwrap();
        registry.add(work.clone()).await.unwrap();
        registry.add(personal.clone()).await.unwrap();

        let clock = Arc::new(FixedClock::default());
        let tokens = Arc::new(
            TokenVaultStore::open(data.tokens())
                .await
                .unwrap()
                .with_clock(clock.clone()),
        );
        for identity in [&work, &personal] {
            tokens
                .store_token(
                    &identity.alias,
                    Token::new(format!("ghp_{}", identity.alias)),
                    TokenMetadata::new(&identity.username, TokenType::Classic, clock.now()),
                )
                .await
                .unwrap();
        }

        let agent = Arc::new(MemoryAgent::new());
        let ssh = AgentIsolationManager::new(agent.clone(), data.agents(), SshIsolationConfig::default());
        let git = Arc::new(MemoryGitConfig::new());

        let switcher = Switcher::new(
            Arc::new(registry),
            StateFile::new(data.state()),
            tokens.clone(),
            Arc::new(ssh),
            git.clone(),
            Arc::new(EnvFile::new(data.env_file())),
        )
        .with_clock(clock.clone());

        Self {
            dir,
            data,
            switcher,
            agent,
            git,
            tokens,
            clock,
            work,
            personal,
        }
    }

    pub async fn current_alias(&self) -> Option<String> {
        self.switcher.state_file().load().await.unwrap().current
    }

    pub async fn active_token(&self) -> Option<String> {
        self.tokens.active_alias().await.unwrap()
    }
}
