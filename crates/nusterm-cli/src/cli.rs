//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Reusable session arguments shared by `term` and `pipe`
#[derive(Debug, Clone, Default, Args)]
pub struct SessionArgs {
    /// Auto-pick the first device whose name or address contains this text
    /// [env: NUSTERM_DEVICE]
    #[arg(short, long)]
    pub device: Option<String>,

    /// Offer every BLE device, not only those advertising NUS
    #[arg(short, long)]
    pub all_devices: bool,

    /// Scan duration in seconds before the picker is shown
    #[arg(short = 't', long)]
    pub scan_timeout: Option<u64>,

    /// Split outbound lines into writes of at most this many bytes
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub chunk_size: Option<u16>,
}

#[derive(Parser)]
#[command(name = "nusterm")]
#[command(
    author,
    version,
    about = "Serial console for Bluetooth LE devices exposing the Nordic UART Service",
    long_about = None
)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Arguments for the default `term` command
    #[command(flatten)]
    pub session: SessionArgs,
}

impl Cli {
    /// The command to run; `term` when none was given.
    pub fn selected_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Term(self.session.clone()))
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Open the two-pane terminal (default)
    Term(SessionArgs),

    /// Bridge stdin lines to the device and device output to stdout
    Pipe(SessionArgs),

    /// Scan for nearby NUS devices
    Scan {
        /// Scan timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// List every BLE device, not only those advertising NUS
        #[arg(short, long)]
        all_devices: bool,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Print the config file path
    Path,
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_command_defaults_to_term() {
        let cli = Cli::try_parse_from(["nusterm", "--device", "Zephyr"]).unwrap();
        match cli.selected_command() {
            Commands::Term(args) => assert_eq!(args.device.as_deref(), Some("Zephyr")),
            other => panic!("expected term, got {:?}", other),
        }
    }

    #[test]
    fn test_pipe_with_chunk_size() {
        let cli = Cli::try_parse_from(["nusterm", "pipe", "--chunk-size", "20", "-a"]).unwrap();
        match cli.selected_command() {
            Commands::Pipe(args) => {
                assert_eq!(args.chunk_size, Some(20));
                assert!(args.all_devices);
            }
            other => panic!("expected pipe, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(Cli::try_parse_from(["nusterm", "pipe", "--chunk-size", "0"]).is_err());
    }

    #[test]
    fn test_scan_json() {
        let cli = Cli::try_parse_from(["nusterm", "scan", "--format", "json", "-t", "3"]).unwrap();
        match cli.selected_command() {
            Commands::Scan {
                timeout, format, ..
            } => {
                assert_eq!(timeout, Some(3));
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("expected scan, got {:?}", other),
        }
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["nusterm", "-v", "-q", "scan"]).is_err());
    }
}
