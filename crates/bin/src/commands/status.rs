//! `status` and `env` commands.

use gitswitch::{
    Switcher,
    env::{EnvironmentConfigurator, render_exports},
};

use super::CommandResult;
use crate::output::{OutputFormat, print_json};

/// Run the `status` command
pub async fn run(switcher: &Switcher, format: OutputFormat) -> CommandResult {
    let status = switcher.status().await?;
    if format == OutputFormat::Json {
        print_json(&status)?;
        return Ok(());
    }

    match &status.current {
        Some(identity) => println!(
            "Current:      {} ({} <{}>)",
            identity.alias, identity.name, identity.email
        ),
        None => println!("Current:      (none)"),
    }
    println!(
        "Active token: {}",
        status.active_token.as_deref().unwrap_or("(none)")
    );
    if let Some(last) = &status.state.last_switch {
        println!(
            "Last switch:  {} -> {} at {} ({})",
            last.from.as_deref().unwrap_or("(none)"),
            last.to,
            last.at.to_rfc3339(),
            last.transaction_id
        );
    }
    if let Some(exports) = &status.exports {
        for (name, value) in exports {
            println!("  {name}={value}");
        }
    }
    Ok(())
}

/// Run the `env` command: exports suitable for `eval "$(gitswitch env)"`.
pub async fn env(switcher: &Switcher, format: OutputFormat) -> CommandResult {
    let exports = switcher.environment().read().await?;
    match format {
        OutputFormat::Json => print_json(&exports.unwrap_or_default())?,
        OutputFormat::Human => {
            if let Some(exports) = exports {
                print!("{}", render_exports(&exports)?);
            }
        }
    }
    Ok(())
}
