// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::service::ServiceError;
use crate::types::TaskId;

#[derive(Error, Debug)]
pub enum MultijobError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Remote job service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Hardware tier '{0}' not found in project")]
    TierNotFound(String),

    #[error("Pipeline execution failed; permanently failed tasks: {}", failed.join(", "))]
    PipelineFailed { failed: Vec<TaskId> },

    #[error("Gave up waiting for {what}: deadline exceeded")]
    WaitDeadlineExceeded { what: String },

    #[error("Cancelled while waiting for {what}")]
    Cancelled { what: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, MultijobError>;
