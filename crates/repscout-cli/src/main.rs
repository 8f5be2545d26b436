// Copyright 2026 Repscout Contributors
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

mod cli;
mod config;
mod ledger;

#[derive(Parser)]
#[command(
    name = "repscout",
    about = "Repscout: batch phone-number reputation lookups through rotating egress",
    version,
    after_help = "Run 'repscout <command> --help' for details on each command."
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every due number in a JSON store and write results back
    Run(cli::run_cmd::RunArgs),

    /// Look up a single number and print the result as JSON
    Lookup(cli::lookup_cmd::LookupArgs),

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   repscout completions bash > ~/.local/share/bash-completion/completions/repscout
    ///   repscout completions zsh > ~/.zfunc/_repscout
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn init_logging(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "repscout", &mut std::io::stdout());
            Ok(())
        }
        command => {
            init_logging(&cli.log_level, cli.log_json);
            match command {
                Commands::Run(args) => cli::run_cmd::run(args).await,
                Commands::Lookup(args) => cli::lookup_cmd::run(args).await,
                Commands::Completions { .. } => Ok(()),
            }
        }
    };

    // 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    result
}
