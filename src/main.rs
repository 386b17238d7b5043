mod cli;
mod commands;
mod config;
mod loader;
mod resource;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Explicit config file
    pub config: Option<PathBuf>,
    pub overrides: config::Overrides,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        overrides: config::Overrides {
            server: cli.server,
            namespace: cli.namespace,
            token: cli.token,
            jobs: None,
        },
    };

    match cli.command {
        Command::Run(args) => commands::run::run(&ctx, args),
        Command::Check(args) => commands::check::run(&ctx, args),
        Command::Status(args) => commands::status::run(&ctx, args),
        Command::Delete(args) => commands::delete::run(&ctx, args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "appflow", &mut io::stdout());
            Ok(())
        }
    }
}
