// src/engine/mod.rs

//! Orchestration engine for multijob.
//!
//! - [`scheduler`] is the tick-driven control loop.
//! - [`gates`] holds the lock and queue-depth gates it runs every tick.
//! - [`poll`] is the sleep-then-repoll utility behind every wait.

pub mod gates;
pub mod poll;
pub mod scheduler;

pub use poll::{PollPolicy, Poller, poll_until};
pub use scheduler::{Scheduler, TickStep};
