//! Subcommand implementations.

pub mod account;
pub mod status;
pub mod switch;
pub mod token;

/// Error type returned by every command.
pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;
