//! Maildir storage for records.
//!
//! This module provides the persistence layer using plain maildirs with:
//! - Two-phase deliveries (`tmp/` then `new/` or `cur/`)
//! - Lookup by record identity
//! - In-place atomic rewrites
//!
//! # Submodules
//!
//! - [`maildir`] - Maildir layout, deliveries and lookup

pub mod maildir;

pub use maildir::{Delivery, Maildir};
