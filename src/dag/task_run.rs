// src/dag/task_run.rs

//! Submission/retry lifecycle of one DAG node.

use tracing::{debug, info};

use crate::config::TaskDescriptor;
use crate::errors::Result;
use crate::service::JobService;
use crate::types::{ExecutionStatus, JobId, TaskId};

/// One task plus the state of its latest job.
///
/// Status only moves through [`TaskRun::mark_submitted`] (local) and
/// [`TaskRun::status`] (remote poll). Cached statuses, see
/// [`ExecutionStatus::is_cached`], are never re-polled until the task is
/// resubmitted.
#[derive(Debug, Clone)]
pub struct TaskRun {
    descriptor: TaskDescriptor,
    job_id: Option<JobId>,
    /// Submissions beyond the first.
    retries: u32,
    status: ExecutionStatus,
}

impl TaskRun {
    pub fn new(descriptor: TaskDescriptor) -> Self {
        Self {
            descriptor,
            job_id: None,
            retries: 0,
            status: ExecutionStatus::Unsubmitted,
        }
    }

    /// Rebuild a run in an arbitrary state, e.g. to resume or to test.
    pub fn from_parts(
        descriptor: TaskDescriptor,
        job_id: Option<JobId>,
        retries: u32,
        status: ExecutionStatus,
    ) -> Self {
        Self {
            descriptor,
            job_id,
            retries,
            status,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.descriptor.task_id
    }

    pub fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn max_retries(&self) -> u32 {
        self.descriptor.max_retries
    }

    /// Last known status, without contacting the service.
    pub fn cached_status(&self) -> &ExecutionStatus {
        &self.status
    }

    /// Current status, polling the service unless the status is cached.
    ///
    /// Transport errors are returned, never swallowed.
    pub async fn status(&mut self, service: &dyn JobService) -> Result<ExecutionStatus> {
        if self.status.is_cached() {
            return Ok(self.status.clone());
        }
        let Some(job_id) = self.job_id.as_deref() else {
            return Ok(self.status.clone());
        };

        let polled = service.job_status(job_id).await?;
        if polled != self.status {
            debug!(
                task = %self.descriptor.task_id,
                job_id,
                from = %self.status,
                to = %polled,
                "task status changed"
            );
        }
        self.status = polled.clone();
        Ok(polled)
    }

    /// `status() == Succeeded`, polling if needed.
    pub async fn is_complete(&mut self, service: &dyn JobService) -> Result<bool> {
        Ok(self.status(service).await? == ExecutionStatus::Succeeded)
    }

    /// Whether the last known status is `Succeeded`.
    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }

    /// Failed with retry budget left.
    pub fn is_retryable(&self) -> bool {
        self.status.is_failure() && self.retries < self.descriptor.max_retries
    }

    /// Failed with the retry budget exhausted. Never resubmitted.
    pub fn is_permanently_failed(&self) -> bool {
        self.status.is_failure() && self.retries >= self.descriptor.max_retries
    }

    /// A job was started and its status is still being polled.
    pub fn is_in_flight(&self) -> bool {
        self.job_id.is_some() && !self.status.is_cached()
    }

    /// Record a new submission.
    ///
    /// Resubmitting after `Failed`/`Error` counts as a retry.
    pub fn mark_submitted(&mut self, job_id: JobId) {
        if self.status.is_failure() {
            self.retries += 1;
        }
        info!(
            task = %self.descriptor.task_id,
            job_id = %job_id,
            retries = self.retries,
            previous = %self.status,
            "task submitted"
        );
        self.job_id = Some(job_id);
        self.status = ExecutionStatus::Submitted;
    }
}
