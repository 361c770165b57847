//! Config command implementation.

use crate::config::{Configuration, resolve_config_path};
use crate::error::Result;
use std::path::Path;

const REDACTED: &str = "********";

/// Passwords are never printed.
fn redact(mut config: Configuration) -> Configuration {
    for remote in config.remotes.values_mut() {
        if !remote.password.is_empty() {
            remote.password = REDACTED.to_string();
        }
    }
    config
}

/// Execute the config command: print the resolved configuration as JSON.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
pub fn execute(config_path: Option<&Path>, json: bool) -> Result<()> {
    let path = resolve_config_path(config_path)?;
    let config = redact(super::load_config(Some(&path))?);

    if json {
        let output = serde_json::json!({
            "path": path.display().to_string(),
            "config": config,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("# {}", path.display());
        println!("{}", serde_json::to_string_pretty(&config)?);
    }
    Ok(())
}
