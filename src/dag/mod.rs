// src/dag/mod.rs

//! DAG representation.
//!
//! - [`task_run`] is the per-task submission/retry state machine.
//! - [`graph`] holds every [`TaskRun`] plus the dependency lists, and
//!   answers readiness and aggregate pipeline status.

pub mod graph;
pub mod task_run;

pub use graph::DependencyGraph;
pub use task_run::TaskRun;
