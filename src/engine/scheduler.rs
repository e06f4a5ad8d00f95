// src/engine/scheduler.rs

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::coordinator::{AdvisoryLock, GitRefOverrideCoordinator};
use crate::dag::DependencyGraph;
use crate::engine::gates;
use crate::engine::poll::{PollPolicy, Poller};
use crate::errors::{MultijobError, Result};
use crate::service::JobService;
use crate::types::{JobId, PipelineStatus, TaskId};

/// What one tick observed and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickStep {
    /// Pipeline status at the start of the tick.
    pub pipeline: PipelineStatus,
    /// Tasks that were ready after the gates opened.
    pub ready: Vec<TaskId>,
    /// Tasks submitted this tick, with their new job ids.
    pub submitted: Vec<(TaskId, JobId)>,
}

impl TickStep {
    fn finished(pipeline: PipelineStatus) -> Self {
        Self {
            pipeline,
            ready: Vec::new(),
            submitted: Vec::new(),
        }
    }
}

/// Tick-driven control loop over a [`DependencyGraph`].
///
/// Each tick:
/// 1. refreshes statuses and evaluates the pipeline (`Succeeded` ends the
///    loop, `Failed` is an error naming the failed tasks),
/// 2. waits while the advisory lock tag is present,
/// 3. waits while the project queue is at its limit,
/// 4. submits up to `submissions_per_tick` ready tasks, in config order.
pub struct Scheduler<'a> {
    graph: DependencyGraph,
    service: &'a dyn JobService,
    settings: &'a Settings,
    cancel: CancellationToken,
    /// Set once the stall warning has been logged, cleared on progress.
    stall_reported: bool,
}

impl<'a> Scheduler<'a> {
    pub fn new(graph: DependencyGraph, service: &'a dyn JobService, settings: &'a Settings) -> Self {
        Self {
            graph,
            service,
            settings,
            cancel: CancellationToken::new(),
            stall_reported: false,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn into_graph(self) -> DependencyGraph {
        self.graph
    }

    /// Run ticks until the pipeline succeeds, fails, or is cancelled.
    pub async fn run(&mut self) -> Result<PipelineStatus> {
        info!(tasks = self.graph.len(), "starting pipeline\n{}", self.graph);

        let cancel = self.cancel.clone();
        let mut ticker = Poller::new(
            PollPolicy::every(self.settings.tick_freq),
            &cancel,
            "next scheduler tick",
        );

        loop {
            let step = self.tick().await?;
            if step.pipeline == PipelineStatus::Succeeded {
                return Ok(step.pipeline);
            }
            ticker.wait().await?;
        }
    }

    /// One pass of the control loop.
    pub async fn tick(&mut self) -> Result<TickStep> {
        self.graph.refresh(self.service).await?;

        match self.graph.pipeline_status() {
            PipelineStatus::Failed => {
                let failed = self.graph.failed_tasks();
                error!(failed = ?failed, "pipeline failed");
                return Err(MultijobError::PipelineFailed { failed });
            }
            PipelineStatus::Succeeded => {
                let failed = self.graph.failed_tasks();
                if failed.is_empty() {
                    info!("pipeline succeeded");
                } else {
                    warn!(failed = ?failed, "pipeline succeeded with permanently failed tasks");
                }
                return Ok(TickStep::finished(PipelineStatus::Succeeded));
            }
            PipelineStatus::Running => {}
        }

        let lock = AdvisoryLock::new(
            self.service,
            &self.settings.project_id,
            &self.settings.lock_tag,
        );
        let gate_policy = self.settings.gate_policy();
        gates::wait_for_unlock(&lock, gate_policy, &self.cancel, self.settings.lock_lease).await?;
        gates::wait_for_queue_space(
            self.service,
            &self.settings.project_id,
            self.settings.queue_limit,
            gate_policy,
            &self.cancel,
        )
        .await?;

        // The gates may have waited a while; readiness is judged on fresh statuses.
        self.graph.refresh(self.service).await?;
        let ready = self.graph.ready_tasks();
        if ready.is_empty() {
            self.report_stall();
        } else {
            info!(ready = ?ready, "ready tasks");
            self.stall_reported = false;
        }

        let coordinator = GitRefOverrideCoordinator::new(self.service, self.settings)
            .with_cancellation(self.cancel.clone());

        let mut submitted = Vec::new();
        for task_id in ready.iter().take(self.settings.submissions_per_tick) {
            let Some(descriptor) = self.graph.task(task_id).map(|run| run.descriptor().clone())
            else {
                continue;
            };
            let job_id = coordinator.submit(&descriptor).await?;
            self.graph.mark_submitted(task_id, job_id.clone())?;
            submitted.push((task_id.clone(), job_id));
        }

        Ok(TickStep {
            pipeline: PipelineStatus::Running,
            ready,
            submitted,
        })
    }

    /// Warn once when nothing is in flight and nothing can be submitted.
    fn report_stall(&mut self) {
        if !self.graph.in_flight().is_empty() {
            self.stall_reported = false;
            return;
        }
        if self.stall_reported {
            return;
        }
        warn!(
            blocked = ?self.graph.blocked_tasks(),
            "no task is running and none is ready; remaining tasks wait on dependencies \
             that will not succeed"
        );
        self.stall_reported = true;
    }
}
