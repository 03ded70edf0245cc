//! CLI argument definitions for the gitswitch binary.

use std::{path::PathBuf, time::Duration};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use gitswitch::TransactionOptions;

/// Switch between Git hosting identities without leaking keys or tokens
#[derive(Parser, Debug)]
#[command(name = "gitswitch")]
#[command(version)]
pub struct Cli {
    /// Data directory for accounts, tokens, state and agent sockets.
    /// Defaults to the platform config directory.
    #[arg(short = 'D', long, global = true, env = "GITSWITCH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Switch to another identity
    Switch(SwitchArgs),
    /// Check whether a switch would succeed, without changing anything
    Validate(ValidateArgs),
    /// Show the current identity and its isolation state
    Status,
    /// Print the shell exports for the current identity
    Env,
    /// Manage identities
    #[command(subcommand)]
    Account(AccountCommand),
    /// Manage API tokens
    #[command(subcommand)]
    Token(TokenCommand),
}

/// Overrides for the transaction defaults in `config.json`
#[derive(clap::Args, Debug)]
pub struct TransactionArgs {
    /// Treat warnings such as a missing token as errors
    #[arg(long)]
    pub strict: bool,

    /// Leave completed steps in place when a later step fails
    #[arg(long)]
    pub no_rollback: bool,

    /// Skip pre-switch validation
    #[arg(long)]
    pub no_validate_before: bool,

    /// Skip post-switch verification
    #[arg(long)]
    pub no_validate_after: bool,

    /// Deadline for the whole switch, in seconds
    #[arg(long, env = "GITSWITCH_TIMEOUT", value_parser = parse_seconds)]
    pub timeout: Option<Duration>,

    #[arg(long)]
    pub skip_ssh_validation: bool,

    #[arg(long)]
    pub skip_token_validation: bool,
}

impl TransactionArgs {
    /// Apply the flags that were given on top of `defaults`.
    pub fn apply(&self, defaults: &TransactionOptions) -> TransactionOptions {
        let mut options = defaults.clone();
        options.strict_validation |= self.strict;
        options.rollback_on_failure &= !self.no_rollback;
        options.validate_before_switch &= !self.no_validate_before;
        options.validate_after_switch &= !self.no_validate_after;
        options.skip_ssh_validation |= self.skip_ssh_validation;
        options.skip_token_validation |= self.skip_token_validation;
        if let Some(timeout) = self.timeout {
            options.timeout = timeout;
        }
        options
    }
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value.parse().map_err(|e| format!("{e}"))?;
    if secs <= 0.0 {
        return Err("timeout must be positive".to_string());
    }
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}

#[derive(clap::Args, Debug)]
pub struct SwitchArgs {
    /// Alias of the identity to switch to
    pub alias: String,

    /// Write user.name/user.email to this repository instead of the global config
    #[arg(long, value_name = "REPO")]
    pub local: Option<PathBuf>,

    /// Run pre-switch validation only
    #[arg(long)]
    pub validate_only: bool,

    #[command(flatten)]
    pub transaction: TransactionArgs,
}

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    pub alias: String,

    #[arg(long, value_name = "REPO")]
    pub local: Option<PathBuf>,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

#[derive(Subcommand, Debug)]
pub enum AccountCommand {
    /// Register a new identity
    Add(AccountAddArgs),
    /// List registered identities
    List,
    /// Remove an identity and its token
    Remove(AliasArgs),
}

#[derive(clap::Args, Debug)]
pub struct AccountAddArgs {
    pub alias: String,

    /// Value for git user.name
    #[arg(long)]
    pub name: String,

    /// Value for git user.email
    #[arg(long)]
    pub email: String,

    /// Username on the hosting platform
    #[arg(long)]
    pub username: String,

    /// Private key for this identity; `<key>.pub` must sit next to it
    #[arg(long)]
    pub ssh_key: Option<PathBuf>,

    /// Value for git user.signingkey
    #[arg(long)]
    pub signing_key: Option<String>,

    /// Do not manage an ssh-agent for this identity
    #[arg(long)]
    pub no_ssh_isolation: bool,

    /// Do not activate a token for this identity
    #[arg(long)]
    pub no_token_isolation: bool,
}

#[derive(clap::Args, Debug)]
pub struct AliasArgs {
    pub alias: String,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Store the API token for an identity
    Set(TokenSetArgs),
    /// Delete the stored token for an identity
    Remove(AliasArgs),
    /// Show token metadata (never the token itself)
    Show(AliasArgs),
}

#[derive(clap::Args, Debug)]
pub struct TokenSetArgs {
    pub alias: String,

    /// The token. Read from stdin when omitted.
    #[arg(long, env = "GITSWITCH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Platform user the token belongs to. Defaults to the identity's username.
    #[arg(long)]
    pub username: Option<String>,

    /// Expiry as an RFC 3339 timestamp
    #[arg(long)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Check ownership right away (uses the platform API when enabled)
    #[arg(long)]
    pub verify: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_only_what_was_given() {
        let defaults = TransactionOptions {
            strict_validation: true,
            ..Default::default()
        };
        let cli = Cli::parse_from(["gitswitch", "switch", "work", "--no-rollback", "--timeout", "2.5"]);
        let Commands::Switch(args) = cli.command else {
            panic!("expected switch");
        };
        let options = args.transaction.apply(&defaults);
        assert!(options.strict_validation);
        assert!(!options.rollback_on_failure);
        assert!(options.validate_after_switch);
        assert_eq!(options.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(parse_seconds("0").is_err());
        assert!(parse_seconds("abc").is_err());
    }

    #[test]
    fn local_scope_flag() {
        let cli = Cli::parse_from(["gitswitch", "--json", "switch", "work", "--local", "/src/repo"]);
        assert!(cli.json);
        let Commands::Switch(args) = cli.command else {
            panic!("expected switch");
        };
        assert_eq!(args.local, Some(PathBuf::from("/src/repo")));
    }
}
