//! Avalanche CLI: command-line identity client for Avalanche CMS.
//!
//! Thin command surface over `avalanche-common`: every subcommand emits a
//! structured JSON document on stdout and exits 0 on success, 1 on any
//! guard or authentication failure. Diagnostics go to stderr via tracing
//! (`RUST_LOG` controls verbosity), keeping stdout machine-parseable.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

mod commands;
mod flags;
mod output;

use std::process::ExitCode;

use avalanche_common::OidcConfig;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::flags::FeatureSet;

/// Avalanche CLI
#[derive(Parser)]
#[command(name = "av", about = "Avalanche CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to Avalanche CMS via the browser.
    Login {
        /// Enable quiet mode (suppresses informational output).
        #[arg(short, long)]
        quiet: bool,
    },
    /// End the current session and clear stored tokens.
    Logout,
    /// User account commands.
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Session inspection commands.
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Show the logged-in user.
    Show,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Show session and token status.
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = OidcConfig::from_env();
    let features = FeatureSet::load();

    let result = match cli.command {
        Commands::Login { quiet } => commands::login::run(config, quiet).await,
        Commands::Logout => commands::logout::run(config).await,
        Commands::User { command: UserCommands::Show } => commands::user::run(config).await,
        Commands::Session { command: SessionCommands::Show } => {
            commands::session::run(config, &features).await
        }
    };

    match result {
        Ok(value) => {
            output::print_success(&value);
            ExitCode::SUCCESS
        }
        Err(err) => {
            output::print_error(&err, features.verbose_errors);
            ExitCode::FAILURE
        }
    }
}
