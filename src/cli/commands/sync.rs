//! Sync command implementation.
//!
//! Each selected remote is connected (credentials checked with
//! `/myself`) and mirrored into its maildirs. A failed remote does not
//! stop the others; the command fails afterwards.

use crate::config::Configuration;
use crate::error::Result;
use crate::remote::{JiraClient, JiraRemote};
use crate::sync::{SyncReport, sync_all};
use colored::Colorize;
use std::path::Path;

/// Execute the sync command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, a remote name
/// is unknown, or any remote failed.
pub fn execute(remotes: &[String], config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = super::load_config(config_path)?;
    let report = run(&config, remotes)?;

    if json {
        let output = serde_json::json!({
            "success": report.failed() == 0,
            "remotes": report.remotes,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_report(&report);
    }

    report.check()
}

fn run(config: &Configuration, remotes: &[String]) -> Result<SyncReport> {
    sync_all(config, remotes, |name, remote| {
        let client = JiraClient::new(name, &remote.base_url, &remote.username, &remote.password);
        JiraRemote::connect(client)
    })
}

fn print_report(report: &SyncReport) {
    if report.remotes.is_empty() {
        println!("No remotes configured.");
        return;
    }

    for remote in &report.remotes {
        let status = match &remote.error {
            None => "ok".green().bold(),
            Some(_) => "failed".red().bold(),
        };
        println!("{} {}", remote.remote.bold(), status);

        let s = &remote.stats;
        println!("  Found:     {}", s.found);
        println!("  Handled:   {}", s.handled);
        println!("  Written:   {}", s.written);
        println!("  Unchanged: {}", s.unchanged);
        if s.removed > 0 {
            println!("  Removed:   {}", s.removed);
        }
        if s.tagged > 0 {
            println!("  Tagged:    {}", s.tagged);
        }
        if let Some(error) = &remote.error {
            println!("  Error:     {error}");
        }
    }
}
