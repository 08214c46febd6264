//! nusterm: serial console for Bluetooth LE devices exposing the Nordic UART
//! Service.

mod cli;
mod commands;
mod config;
mod format;
mod logging;
mod picker;
mod style;
#[cfg(feature = "tui")]
mod tui;

use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::{CommandFactory, Parser};

use cli::{Cli, Commands, SessionArgs};
use config::{Config, DEFAULT_SCAN_TIMEOUT, SessionSettings};
use format::FormatOptions;

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    let command = cli.selected_command();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "nusterm", &mut io::stdout());
        return Ok(());
    }

    let config = Config::load();

    match command {
        Commands::Term(args) => run_term(&cli, &config, &args).await,
        Commands::Pipe(args) => {
            logging::init_stderr(cli.verbose, cli.quiet);
            commands::cmd_pipe(SessionSettings::resolve(&args, &config), cli.quiet).await
        }
        Commands::Scan {
            timeout,
            format,
            all_devices,
        } => {
            logging::init_stderr(cli.verbose, cli.quiet);
            let timeout = timeout
                .or(config.scan_timeout)
                .unwrap_or(DEFAULT_SCAN_TIMEOUT);
            let all_devices = all_devices || config.accept_all_devices;
            let opts = FormatOptions::new(cli.no_color);
            commands::cmd_scan(timeout, format, all_devices, cli.quiet, &opts).await
        }
        Commands::Config { action } => {
            logging::init_stderr(cli.verbose, cli.quiet);
            commands::cmd_config(action)
        }
        Commands::Completions { .. } => {
            // Already handled above
            Ok(())
        }
    }
}

#[cfg(feature = "tui")]
async fn run_term(cli: &Cli, config: &Config, args: &SessionArgs) -> Result<()> {
    let settings = SessionSettings::resolve(args, config);

    if !io::stdout().is_terminal() {
        logging::init_stderr(cli.verbose, cli.quiet);
        tracing::warn!("stdout is not a terminal; using line mode");
        return commands::cmd_pipe(settings, cli.quiet).await;
    }

    let log_file = config.log_file();
    if let Err(e) = logging::init_file(&log_file, cli.verbose, cli.quiet) {
        eprintln!("Warning: {:#}. Logging is disabled.", e);
    }
    tui::run(settings, config.scrollback).await
}

#[cfg(not(feature = "tui"))]
async fn run_term(cli: &Cli, config: &Config, args: &SessionArgs) -> Result<()> {
    logging::init_stderr(cli.verbose, cli.quiet);
    tracing::info!("Built without the terminal UI; using line mode");
    commands::cmd_pipe(SessionSettings::resolve(args, config), cli.quiet).await
}
