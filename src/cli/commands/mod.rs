//! Command implementations.

pub mod checksum;
pub mod completions;
pub mod config;
pub mod show;
pub mod sync;
pub mod version;

use crate::config::{Configuration, default_config_path, resolve_config_path};
use crate::error::Result;
use crate::message::Layout;
use std::path::Path;
use tracing::debug;

/// Load the configuration from `--config`, `JIRAMAIL_CONFIG` or the
/// default location.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<Configuration> {
    let path = resolve_config_path(explicit)?;
    debug!(path = %path.display(), "loading configuration");
    Configuration::load(&path)
}

/// Record layout for commands that work on single files. Without an
/// explicit config and without a default config file the built-in layout
/// is used.
pub(crate) fn load_layout(explicit: Option<&Path>) -> Result<Layout> {
    if explicit.is_none() && !default_config_path().is_ok_and(|p| p.exists()) {
        return Ok(Layout::default());
    }
    Ok(load_config(explicit)?.mail.layout())
}
