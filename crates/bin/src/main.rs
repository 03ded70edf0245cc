use clap::Parser;
use gitswitch::{
    Switcher,
    config::{Config, DataDir},
};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;

use cli::{AccountCommand, Cli, Commands, TokenCommand};
use output::OutputFormat;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so `--json` output on stdout stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("gitswitch=info".parse()?))
        .init();

    let cli = Cli::parse();
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let data_dir = match &cli.data_dir {
        Some(path) => DataDir::new(path),
        None => DataDir::new(DataDir::default_location()?),
    };
    let config = Config::load(data_dir.root()).await?;
    tracing::debug!(data_dir = %data_dir.root().display(), "Loaded configuration");
    let switcher = Switcher::open(&data_dir, &config).await?;

    let succeeded = match &cli.command {
        Commands::Switch(args) => commands::switch::run(&switcher, &config, args, format).await?,
        Commands::Validate(args) => {
            commands::switch::validate(&switcher, &config, args, format).await?
        }
        Commands::Status => {
            commands::status::run(&switcher, format).await?;
            true
        }
        Commands::Env => {
            commands::status::env(&switcher, format).await?;
            true
        }
        Commands::Account(cmd) => {
            match cmd {
                AccountCommand::Add(args) => commands::account::add(&switcher, args, format).await?,
                AccountCommand::List => commands::account::list(&switcher, format).await?,
                AccountCommand::Remove(args) => {
                    commands::account::remove(&switcher, args, format).await?
                }
            }
            true
        }
        Commands::Token(cmd) => {
            match cmd {
                TokenCommand::Set(args) => commands::token::set(&switcher, args, format).await?,
                TokenCommand::Remove(args) => {
                    commands::token::remove(&switcher, args, format).await?
                }
                TokenCommand::Show(args) => commands::token::show(&switcher, args, format).await?,
            }
            true
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
