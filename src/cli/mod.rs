//! CLI module for webshell
//!
//! Commands:
//! - `serve`: Start the server (default)
//! - `config`: Print the effective configuration

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::server::{self, AppConfig};

/// Webshell CLI
#[derive(Parser, Debug)]
#[command(name = "webshell")]
#[command(about = "Remote command execution shell over websocket")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server (default)
    Serve(ServeArgs),
    /// Print the effective configuration as TOML
    Config,
}

/// Listener overrides for `serve`
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to bind, overrides server.host
    #[arg(long)]
    pub host: Option<String>,
    /// Port to bind, overrides server.port
    #[arg(long)]
    pub port: Option<u16>,
}

impl ServeArgs {
    fn apply(self, config: &mut AppConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

/// Run the CLI command
pub async fn run(cli: Cli, mut config: AppConfig) -> Result<()> {
    match cli.command {
        Some(Commands::Config) => {
            let text = toml::to_string_pretty(&config).context("Failed to render configuration")?;
            print!("{}", text);
            Ok(())
        }
        Some(Commands::Serve(args)) => {
            args.apply(&mut config);
            server::run(config).await
        }
        None => server::run(config).await,
    }
}
