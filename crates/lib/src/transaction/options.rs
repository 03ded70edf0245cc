use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_secs;

/// Knobs for one switch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TransactionOptions {
    /// Treat pre-validation warnings (e.g. no token configured) as errors.
    pub strict_validation: bool,

    /// Undo completed steps when a later one fails.
    pub rollback_on_failure: bool,

    pub validate_before_switch: bool,

    /// Re-check every completed step after the forward pass; a failed check
    /// rolls the switch back.
    pub validate_after_switch: bool,

    /// Bound on the whole forward pass, including post-validation.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,

    pub skip_ssh_validation: bool,

    pub skip_token_validation: bool,

    /// Must stay `false`; [`Transaction::new`](super::Transaction::new) rejects `true`.
    pub concurrent_steps: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            strict_validation: false,
            rollback_on_failure: true,
            validate_before_switch: true,
            validate_after_switch: true,
            timeout: Duration::from_secs(30),
            skip_ssh_validation: false,
            skip_token_validation: false,
            concurrent_steps: false,
        }
    }
}
