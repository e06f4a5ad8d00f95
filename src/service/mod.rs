// src/service/mod.rs

//! Remote job execution service.
//!
//! The scheduler, coordinator and epilogue only talk to the platform through
//! the [`JobService`] trait. [`HttpJobService`] is the production
//! implementation; tests substitute a scripted fake.
//!
//! Every method is a single remote call. None of them retry or block beyond
//! the request itself; waiting and backoff belong to the callers.

pub mod error;
pub mod http;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use crate::types::{ExecutionStatus, GitRef, JobId, SnapshotStatus};

pub use error::{Result, ServiceError};
pub use http::HttpJobService;

/// Body of a job-start request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJobRequest {
    pub project_id: String,
    pub command_to_run: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_hardware_tier_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_repo_git_ref: Option<GitRef>,
}

/// A tag attached to the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTag {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareTier {
    pub id: String,
    pub name: String,
}

/// A git repository imported into the project, with its configured ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedRepository {
    pub id: String,
    pub name: String,
    pub git_ref: GitRef,
}

/// A read-write dataset attached to the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub id: String,
    /// Mount path of the dataset inside the running job.
    pub path: PathBuf,
}

/// A freshly created dataset snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: String,
    pub dataset_id: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub creation_time_ms: i64,
}

/// Contract of the remote job execution platform.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Start a job and return its id.
    async fn start_job(&self, request: &StartJobRequest) -> Result<JobId>;

    /// Current execution status of a job.
    async fn job_status(&self, job_id: &str) -> Result<ExecutionStatus>;

    /// Number of jobs in the `queued` state for the project.
    async fn queued_job_count(&self, project_id: &str) -> Result<u64>;

    async fn project_tags(&self, project_id: &str) -> Result<Vec<ProjectTag>>;

    /// Attach a tag to the project and return the new tag's id.
    async fn create_project_tag(&self, project_id: &str, name: &str) -> Result<String>;

    async fn delete_project_tag(&self, project_id: &str, tag_id: &str) -> Result<()>;

    async fn hardware_tiers(&self, project_id: &str) -> Result<Vec<HardwareTier>>;

    async fn imported_repositories(&self, project_id: &str) -> Result<Vec<ImportedRepository>>;

    async fn set_repository_ref(
        &self,
        project_id: &str,
        repository_id: &str,
        git_ref: &GitRef,
    ) -> Result<()>;

    async fn project_datasets(&self, project_id: &str) -> Result<Vec<Dataset>>;

    async fn create_snapshot(&self, dataset_id: &str, paths: &[String]) -> Result<Snapshot>;

    async fn snapshot_status(&self, snapshot_id: &str) -> Result<SnapshotStatus>;

    async fn dataset_name(&self, dataset_id: &str) -> Result<String>;

    async fn tag_snapshot(&self, dataset_id: &str, snapshot_id: &str, tag: &str) -> Result<()>;

    async fn post_job_comment(&self, job_id: &str, comment: &str) -> Result<()>;
}
