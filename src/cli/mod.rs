//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// jiramail - mirror Jira into maildirs
#[derive(Parser, Debug)]
#[command(name = "jiramail", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: ~/.jiramail/config.json)
    #[arg(long, global = true, env = "JIRAMAIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize remotes into their maildirs
    Sync {
        /// Remotes to synchronize (default: all configured remotes)
        remotes: Vec<String>,
    },

    /// Verify stored checksums of record files
    Checksum {
        /// Record files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show the headers and attribute table of a record file
    Show {
        /// Record file
        file: PathBuf,
    },

    /// Print the resolved configuration
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync_remotes() {
        let cli = Cli::parse_from(["jiramail", "sync", "work", "home", "-vv"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Sync { remotes } => assert_eq!(remotes, ["work", "home"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_checksum_requires_files() {
        assert!(Cli::try_parse_from(["jiramail", "checksum"]).is_err());
    }
}
