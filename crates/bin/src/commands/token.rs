//! Token management commands.

use std::io::BufRead;

use gitswitch::{
    Switcher,
    identity::IdentityRegistry,
    token::{Token, TokenIsolationStore, TokenMetadata, TokenType},
};

use super::CommandResult;
use crate::cli::{AliasArgs, TokenSetArgs};
use crate::output::{OutputFormat, print_json, print_table};

fn read_secret(args: &TokenSetArgs) -> CommandResult<String> {
    if let Some(token) = &args.token {
        return Ok(token.trim().to_string());
    }
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let secret = line.trim().to_string();
    if secret.is_empty() {
        return Err("no token given on the command line or stdin".into());
    }
    Ok(secret)
}

/// Run the `token set` command
pub async fn set(switcher: &Switcher, args: &TokenSetArgs, format: OutputFormat) -> CommandResult {
    let identity = switcher.registry().get(&args.alias).await?;
    let secret = read_secret(args)?;
    let username = args.username.clone().unwrap_or_else(|| identity.username.clone());

    let mut metadata = TokenMetadata::new(username, TokenType::detect(&secret), chrono::Utc::now());
    metadata.expires_at = args.expires_at;

    let tokens = switcher.tokens();
    tokens
        .store_token(&args.alias, Token::new(secret), metadata)
        .await?;
    if args.verify {
        tokens
            .validate_token_isolation(&args.alias, &identity.username)
            .await?;
    }

    let stored = tokens.get_token_metadata(&args.alias).await?;
    match format {
        OutputFormat::Human => println!("Stored token for {} ({})", args.alias, stored.username),
        OutputFormat::Json => print_json(&stored)?,
    }
    Ok(())
}

/// Run the `token remove` command
pub async fn remove(switcher: &Switcher, args: &AliasArgs, format: OutputFormat) -> CommandResult {
    switcher.tokens().remove_token(&args.alias).await?;
    match format {
        OutputFormat::Human => println!("Removed token for {}", args.alias),
        OutputFormat::Json => print_json(&serde_json::json!({ "removed": args.alias }))?,
    }
    Ok(())
}

/// Run the `token show` command
pub async fn show(switcher: &Switcher, args: &AliasArgs, format: OutputFormat) -> CommandResult {
    let metadata = switcher.tokens().get_token_metadata(&args.alias).await?;
    match format {
        OutputFormat::Json => print_json(&metadata)?,
        OutputFormat::Human => {
            let optional = |value: Option<chrono::DateTime<chrono::Utc>>| {
                value
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string())
            };
            let rows = vec![
                vec!["username".to_string(), metadata.username.clone()],
                vec!["type".to_string(), format!("{:?}", metadata.token_type)],
                vec!["valid".to_string(), metadata.valid.to_string()],
                vec!["created".to_string(), metadata.created_at.to_rfc3339()],
                vec!["last used".to_string(), optional(metadata.last_used)],
                vec!["expires".to_string(), optional(metadata.expires_at)],
                vec!["scopes".to_string(), metadata.scopes.join(", ")],
            ];
            print_table(&["FIELD", "VALUE"], &rows);
        }
    }
    Ok(())
}
