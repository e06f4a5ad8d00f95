//! Task submission, with the imported-repository ref override protocol.
//!
//! The platform materializes imported repository refs while a job is
//! starting up, not when it is submitted. A task that needs different refs
//! therefore has to change the project-wide repository configuration, submit,
//! wait until its job has left `Queued`/`Pending`, and only then put the
//! configuration back. The advisory lock keeps other schedulers from
//! submitting during that window.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{Settings, TaskDescriptor};
use crate::coordinator::git_refs::{RepoRefAssignment, RepoRefOverride, build_snapshots};
use crate::coordinator::lock::AdvisoryLock;
use crate::engine::poll::poll_until;
use crate::errors::{MultijobError, Result};
use crate::service::{JobService, StartJobRequest};
use crate::types::{ExecutionStatus, JobId};

pub struct GitRefOverrideCoordinator<'a> {
    service: &'a dyn JobService,
    settings: &'a Settings,
    cancel: CancellationToken,
}

impl<'a> GitRefOverrideCoordinator<'a> {
    pub fn new(service: &'a dyn JobService, settings: &'a Settings) -> Self {
        Self {
            service,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn lock(&self) -> AdvisoryLock<'a> {
        AdvisoryLock::new(
            self.service,
            &self.settings.project_id,
            &self.settings.lock_tag,
        )
    }

    /// Start one job for `task` and return its id.
    ///
    /// Tasks without imported repository overrides are submitted directly.
    /// Otherwise the full protocol runs: acquire the lock, snapshot and apply
    /// the refs, submit, wait for startup, restore the refs, release the lock.
    /// A failure after the refs are applied leaves both the override and the
    /// lock in place; it is logged and returned, never rolled back.
    pub async fn submit(&self, task: &TaskDescriptor) -> Result<JobId> {
        info!(task = %task.task_id, "## Submitting task ##\n{task}");

        let request = self.build_request(task).await?;
        let job_id = match task.imported_repo_git_refs.as_deref() {
            Some(overrides) if task.needs_ref_override() => {
                self.start_with_overrides(task, overrides, &request).await?
            }
            _ => self.service.start_job(&request).await?,
        };

        info!(task = %task.task_id, job_id = %job_id, "## Submitted task ##");
        Ok(job_id)
    }

    /// Build the job-start body, resolving the hardware tier name.
    pub async fn build_request(&self, task: &TaskDescriptor) -> Result<StartJobRequest> {
        let override_hardware_tier_id = match &task.tier {
            Some(tier) => Some(self.resolve_tier(tier).await?),
            None => None,
        };

        Ok(StartJobRequest {
            project_id: self.settings.project_id.clone(),
            command_to_run: task.command.clone(),
            override_hardware_tier_id,
            environment_id: task.environment.clone(),
            main_repo_git_ref: task.project_repo_git_ref.clone(),
        })
    }

    /// Hardware tier name → id, by listing the project's tiers.
    pub async fn resolve_tier(&self, name: &str) -> Result<String> {
        let tiers = self.service.hardware_tiers(&self.settings.project_id).await?;
        tiers
            .into_iter()
            .find(|t| t.name == name)
            .map(|t| t.id)
            .ok_or_else(|| MultijobError::TierNotFound(name.to_string()))
    }

    async fn start_with_overrides(
        &self,
        task: &TaskDescriptor,
        overrides: &[RepoRefOverride],
        request: &StartJobRequest,
    ) -> Result<JobId> {
        let lock = self.lock();
        let handle = lock.acquire().await?;

        match self.run_override_window(overrides, request).await {
            Ok(job_id) => {
                lock.release(handle).await?;
                Ok(job_id)
            }
            Err(err) => {
                error!(
                    task = %task.task_id,
                    tag = lock.tag(),
                    tag_id = handle.tag_id(),
                    error = %err,
                    "override protocol interrupted; the lock tag is still on the project and \
                     imported repository refs may still carry the override. Restore the refs \
                     in the project settings, then delete the tag"
                );
                Err(err)
            }
        }
    }

    async fn run_override_window(
        &self,
        overrides: &[RepoRefOverride],
        request: &StartJobRequest,
    ) -> Result<JobId> {
        let current = self
            .service
            .imported_repositories(&self.settings.project_id)
            .await?;
        let snapshots = build_snapshots(&current, overrides);
        debug!(original = ?snapshots.original, desired = ?snapshots.desired, "repository ref snapshots");

        self.apply(&snapshots.desired).await?;
        let job_id = self.service.start_job(request).await?;

        let status = self.wait_for_startup(&job_id).await?;
        info!(job_id = %job_id, %status, "job left Queued/Pending; restoring imported repository refs");

        self.apply(&snapshots.original).await?;
        Ok(job_id)
    }

    async fn apply(&self, assignments: &[RepoRefAssignment]) -> Result<()> {
        for assignment in assignments {
            debug!(
                repository = %assignment.repository_id,
                git_ref = %assignment.git_ref,
                "setting imported repository ref"
            );
            self.service
                .set_repository_ref(
                    &self.settings.project_id,
                    &assignment.repository_id,
                    &assignment.git_ref,
                )
                .await?;
        }
        Ok(())
    }

    /// Poll until the job is past `Queued`/`Pending`; returns that status.
    async fn wait_for_startup(&self, job_id: &str) -> Result<ExecutionStatus> {
        let service = self.service;
        poll_until(
            self.settings.startup_policy(),
            &self.cancel,
            format!("job {job_id} to start up"),
            move || async move {
                let status = service.job_status(job_id).await?;
                debug!(job_id, %status, "waiting for job startup");
                Ok::<_, MultijobError>((!status.is_awaiting_startup()).then_some(status))
            },
        )
        .await
    }
}
