use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical task identifier (the config section name).
pub type TaskId = String;

/// Identifier the remote platform assigns to a started job.
pub type JobId = String;

/// Execution status of a task's latest job.
///
/// `Unsubmitted` and `Submitted` are local-only states; everything else is
/// reported by the remote platform. Unknown platform strings are kept
/// verbatim in `Other` and treated as in-flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExecutionStatus {
    Unsubmitted,
    Submitted,
    Queued,
    Pending,
    Preparing,
    Running,
    Succeeded,
    Failed,
    Error,
    Stopped,
    Other(String),
}

impl ExecutionStatus {
    /// Statuses that are remembered locally; once observed, the remote
    /// service is not asked again until the task is resubmitted.
    pub fn is_cached(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Succeeded
                | ExecutionStatus::Unsubmitted
                | ExecutionStatus::Error
                | ExecutionStatus::Failed
                | ExecutionStatus::Stopped
        )
    }

    /// `Failed` or `Error`: eligible for retry while budget remains.
    pub fn is_failure(&self) -> bool {
        matches!(self, ExecutionStatus::Failed | ExecutionStatus::Error)
    }

    /// The job has not reached its startup phase yet.
    pub fn is_awaiting_startup(&self) -> bool {
        matches!(self, ExecutionStatus::Queued | ExecutionStatus::Pending)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ExecutionStatus::Unsubmitted => "Unsubmitted",
            ExecutionStatus::Submitted => "Submitted",
            ExecutionStatus::Queued => "Queued",
            ExecutionStatus::Pending => "Pending",
            ExecutionStatus::Preparing => "Preparing",
            ExecutionStatus::Running => "Running",
            ExecutionStatus::Succeeded => "Succeeded",
            ExecutionStatus::Failed => "Failed",
            ExecutionStatus::Error => "Error",
            ExecutionStatus::Stopped => "Stopped",
            ExecutionStatus::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for ExecutionStatus {
    fn from(s: &str) -> Self {
        match s.trim() {
            "Unsubmitted" => ExecutionStatus::Unsubmitted,
            "Submitted" => ExecutionStatus::Submitted,
            "Queued" => ExecutionStatus::Queued,
            "Pending" => ExecutionStatus::Pending,
            "Preparing" => ExecutionStatus::Preparing,
            "Running" => ExecutionStatus::Running,
            "Succeeded" => ExecutionStatus::Succeeded,
            "Failed" => ExecutionStatus::Failed,
            "Error" => ExecutionStatus::Error,
            "Stopped" => ExecutionStatus::Stopped,
            other => ExecutionStatus::Other(other.to_string()),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ExecutionStatus::from(s))
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate status of the whole pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStatus::Running => "Running",
            PipelineStatus::Succeeded => "Succeeded",
            PipelineStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Lifecycle of a dataset snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotStatus {
    Creating,
    Active,
    Other(String),
}

impl From<&str> for SnapshotStatus {
    fn from(s: &str) -> Self {
        match s.trim() {
            "Creating" => SnapshotStatus::Creating,
            "Active" => SnapshotStatus::Active,
            other => SnapshotStatus::Other(other.to_string()),
        }
    }
}

/// A git reference as the platform understands it: a ref type such as
/// `branches`, `tags`, `commitId` or `head`, plus an optional value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRef {
    #[serde(rename = "type")]
    pub ref_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl GitRef {
    pub fn new(ref_type: impl Into<String>, value: Option<String>) -> Self {
        Self {
            ref_type: ref_type.into(),
            value,
        }
    }
}

impl FromStr for GitRef {
    type Err = String;

    /// Parse `ref_type[,ref_value]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(',').map(str::trim);
        let ref_type = match parts.next() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return Err(format!("git ref '{s}' is missing a ref type")),
        };
        let value = match parts.next() {
            Some(v) if !v.is_empty() => Some(v.to_string()),
            Some(_) => return Err(format!("git ref '{s}' has an empty ref value")),
            None => None,
        };
        if parts.next().is_some() {
            return Err(format!(
                "git ref '{s}' has too many fields (expected ref_type[,ref_value])"
            ));
        }
        Ok(GitRef { ref_type, value })
    }
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{},{}", self.ref_type, v),
            None => f.write_str(&self.ref_type),
        }
    }
}
