//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// tickloop - single-threaded timer event loop
#[derive(Parser, Debug)]
#[command(name = "tickloop")]
#[command(version)]
#[command(about = "Run timer plans through a single-threaded event loop")]
#[command(
    long_about = "tickloop schedules named one-shot and repeating timers from a TOML plan, fires them in deadline order, and exits once no timers remain."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a timer plan until no timers remain
    Run {
        /// Plan file (TOML)
        plan: PathBuf,

        /// Loop configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print loop and phase statistics as JSON
        #[arg(short, long, default_value_t = false)]
        stats: bool,
    },

    /// Print the effective loop configuration
    Config {
        /// Loop configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from(["tickloop", "run", "plan.toml", "--stats", "-c", "loop.toml"])
            .unwrap();
        match cli.command {
            Commands::Run {
                plan,
                config,
                stats,
            } => {
                assert_eq!(plan, PathBuf::from("plan.toml"));
                assert_eq!(config, Some(PathBuf::from("loop.toml")));
                assert!(stats);
            }
            Commands::Config { .. } => panic!("expected run command"),
        }
    }

    #[test]
    fn test_parse_config_command() {
        let cli = Cli::try_parse_from(["tickloop", "config"]).unwrap();
        assert!(matches!(cli.command, Commands::Config { config: None }));
    }

    #[test]
    fn test_run_requires_plan() {
        assert!(Cli::try_parse_from(["tickloop", "run"]).is_err());
    }
}
