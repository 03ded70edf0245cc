//! Constants used throughout the gitswitch library.
//!
//! Central definitions for file names inside the data directory and the
//! environment variables exported for an active identity.

/// Identity registry file inside the data directory.
pub const ACCOUNTS_FILE: &str = "accounts.json";

/// Current identity pointer file.
pub const STATE_FILE: &str = "state.json";

/// Token vault file. Written with owner-only permissions.
pub const TOKENS_FILE: &str = "tokens.json";

/// Optional configuration file.
pub const CONFIG_FILE: &str = "config.json";

/// Shell-sourceable exports for the active identity.
pub const ENV_FILE: &str = "env.sh";

/// Advisory lock held for the duration of a switch.
pub const LOCK_FILE: &str = "switch.lock";

/// Directory holding one ssh-agent socket per identity.
pub const AGENTS_DIR: &str = "agents";

/// Overrides the SSH command Git runs.
pub const GIT_SSH_COMMAND: &str = "GIT_SSH_COMMAND";

/// Agent socket used by `ssh` and `ssh-add`.
pub const SSH_AUTH_SOCK: &str = "SSH_AUTH_SOCK";

/// Marker carrying the alias of the active identity.
pub const ACTIVE_ACCOUNT_VAR: &str = "GITSWITCH_ACCOUNT";

/// Default public GitHub API endpoint used for token validation.
pub const GITHUB_API_URL: &str = "https://api.github.com";
