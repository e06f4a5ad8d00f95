// src/config/mod.rs

//! Configuration for multijob.
//!
//! Responsibilities:
//! - Define the TOML-backed task file model (`model.rs`).
//! - Turn task sections into validated [`TaskDescriptor`]s (`descriptor.rs`).
//! - Load a task file from disk (`loader.rs`).
//! - Validate DAG invariants: known dependencies, no cycles (`validate.rs`).
//! - Hold the runtime [`Settings`] built once at startup (`settings.rs`).

pub mod descriptor;
pub mod loader;
pub mod model;
pub mod settings;
pub mod validate;

pub use descriptor::TaskDescriptor;
pub use loader::{load_and_validate, load_from_path, parse_str};
pub use model::{ConfigFile, Depends, RawConfigFile, TaskSection};
pub use settings::Settings;
