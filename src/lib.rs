//! jiramail - mirror Jira into maildirs
//!
//! This crate provides the core functionality for the `jiramail` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`table`] - Attribute tables embedded in records
//! - [`message`] - Record text format, checksums and identities
//! - [`storage`] - Maildir layer
//! - [`remote`] - Jira REST client
//! - [`convert`] - Jira entities to records
//! - [`sync`] - Remote-to-maildir synchronization
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod message;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod table;

pub use error::{Error, Result};
