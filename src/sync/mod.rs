//! Remote-to-maildir synchronization.
//!
//! One [`Syncer`] walks a remote and mirrors it into maildirs:
//!
//! - **Globals**: the remote record itself
//! - **Boards**: scrum boards with their sprints, epics and backlog
//! - **Projects**: matching (or referenced) projects with all their issues
//!
//! # Architecture
//!
//! Every record is written through [`Syncer::write_record`]:
//! 1. The stored copy (if any) is looked up by identity
//! 2. Its table values become the `Previous` column of the new record
//! 3. Records whose checksum did not change are left untouched
//! 4. Everything else is delivered atomically, replacing the old copy
//!
//! After a maildir is complete, records whose identity was not seen in
//! the pass are removed or tagged ([`gc::collect`]).
//!
//! # Example
//!
//! ```ignore
//! use jiramail::sync::sync_all;
//!
//! let report = sync_all(&config, &[], |name, remote| connect(name, remote))?;
//! report.check()?;
//! ```
//!
//! # Submodules
//!
//! - [`context`] - Path variables and templates
//! - [`diff`] - One level of attribute history
//! - [`gc`] - Removal of records gone remotely
//! - [`paging`] - Lazy iteration over paged listings

pub mod context;
pub mod diff;
mod engine;
pub mod gc;
pub mod paging;

pub use context::PathContext;
pub use diff::apply_history;
pub use engine::{RemoteReport, SyncReport, SyncStats, Syncer, WriteOutcome, sync_all};
pub use gc::GcStats;
