//! Identity management commands.

use gitswitch::{Identity, Switcher, identity::IdentityRegistry};

use super::CommandResult;
use crate::cli::{AccountAddArgs, AliasArgs};
use crate::output::{OutputFormat, print_json, print_table};

/// Run the `account add` command
pub async fn add(switcher: &Switcher, args: &AccountAddArgs, format: OutputFormat) -> CommandResult {
    let mut identity = Identity::new(&args.alias, &args.name, &args.email, &args.username);
    identity.ssh_key_path = args.ssh_key.clone();
    identity.signing_key = args.signing_key.clone();
    identity.requires_ssh_isolation = !args.no_ssh_isolation;
    identity.requires_token_isolation = !args.no_token_isolation;

    switcher.registry().add(identity.clone()).await?;
    match format {
        OutputFormat::Human => println!("Added {}", identity.alias),
        OutputFormat::Json => print_json(&identity)?,
    }
    Ok(())
}

/// Run the `account list` command
pub async fn list(switcher: &Switcher, format: OutputFormat) -> CommandResult {
    let identities = switcher.registry().list().await?;
    let current = switcher.state_file().load().await?.current;

    match format {
        OutputFormat::Json => print_json(&identities)?,
        OutputFormat::Human => {
            if identities.is_empty() {
                println!("No accounts registered.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = identities
                .iter()
                .map(|identity| {
                    let marker = if current.as_deref() == Some(identity.alias.as_str()) {
                        "*"
                    } else {
                        ""
                    };
                    vec![
                        marker.to_string(),
                        identity.alias.clone(),
                        identity.name.clone(),
                        identity.email.clone(),
                        identity.username.clone(),
                        identity
                            .ssh_key_path
                            .as_ref()
                            .map(|p| p.display().to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    ]
                })
                .collect();
            print_table(&["", "ALIAS", "NAME", "EMAIL", "USERNAME", "SSH KEY"], &rows);
        }
    }
    Ok(())
}

/// Run the `account remove` command
pub async fn remove(switcher: &Switcher, args: &AliasArgs, format: OutputFormat) -> CommandResult {
    let removed = switcher.remove_identity(&args.alias).await?;
    match format {
        OutputFormat::Human => println!("Removed {}", removed.alias),
        OutputFormat::Json => print_json(&removed)?,
    }
    Ok(())
}
