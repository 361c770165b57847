//! jiramail CLI entry point.

use clap::Parser;
use jiramail::cli::commands;
use jiramail::cli::{Cli, Commands};
use jiramail::config::{Configuration, resolve_config_path};
use jiramail::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet, configured_log_level(&cli).as_deref());

    // Run the command and handle errors
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

/// `core.log_level` of the config file, if there is a readable one.
fn configured_log_level(cli: &Cli) -> Option<String> {
    let path = resolve_config_path(cli.config.as_deref()).ok()?;
    if !path.exists() {
        return None;
    }
    Configuration::load(&path).ok()?.core.log_level
}

fn init_tracing(verbose: u8, quiet: bool, configured: Option<&str>) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise the verbosity flag, then the config
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match (verbose, configured) {
            (0, Some(level)) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn")),
            (0, None) => EnvFilter::new("warn"),
            (1, _) => EnvFilter::new("info"),
            (2, _) => EnvFilter::new("debug,reqwest=info,hyper=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> Result<(), Error> {
    let config = cli.config.as_deref();

    match &cli.command {
        Commands::Sync { remotes } => commands::sync::execute(remotes, config, cli.json),
        Commands::Checksum { files } => commands::checksum::execute(files, config, cli.json),
        Commands::Show { file } => commands::show::execute(file, config, cli.json),
        Commands::Config => commands::config::execute(config, cli.json),

        // Shell completions
        Commands::Completions { shell } => commands::completions::execute(shell),
        Commands::Version => commands::version::execute(cli.json),
    }
}
