//! Concrete switch steps, one per [`StepName`](super::StepName).

mod env;
mod git;
mod ssh;
mod token;
mod validation;

pub use env::{EnvironmentStep, exports_for};
pub use git::GitConfigurationStep;
pub use ssh::SshIsolationStep;
pub use token::TokenIsolationStep;
pub use validation::ValidationStep;
