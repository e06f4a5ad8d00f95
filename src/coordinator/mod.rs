// src/coordinator/mod.rs

//! Submission coordination.
//!
//! - [`lock`] is the project-tag advisory lock.
//! - [`git_refs`] parses override strings and builds the restore/apply
//!   snapshots.
//! - [`protocol`] holds [`GitRefOverrideCoordinator`], which submits one task
//!   and runs the override window around it when needed.

pub mod git_refs;
pub mod lock;
pub mod protocol;

pub use git_refs::{OverrideSnapshots, RepoRefAssignment, RepoRefOverride};
pub use lock::{AdvisoryLock, LockHandle};
pub use protocol::GitRefOverrideCoordinator;
