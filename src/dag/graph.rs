// src/dag/graph.rs

//! Tasks plus their dependency lists, and the readiness / aggregate status
//! rules evaluated over them.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::config::{ConfigFile, TaskDescriptor};
use crate::config::validate::validate_tasks;
use crate::dag::task_run::TaskRun;
use crate::errors::{MultijobError, Result};
use crate::service::JobService;
use crate::types::{ExecutionStatus, JobId, PipelineStatus, TaskId};

/// The pipeline DAG.
///
/// Readiness and pipeline status are evaluated against the last known task
/// statuses. [`DependencyGraph::refresh`] polls every in-flight task once, so
/// one evaluation sees a consistent snapshot.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Task ids in config order; this is the iteration order everywhere.
    order: Vec<TaskId>,
    tasks: HashMap<TaskId, TaskRun>,
    dependencies: HashMap<TaskId, Vec<TaskId>>,
    allow_partial_failure: bool,
}

impl DependencyGraph {
    pub fn from_config(cfg: &ConfigFile, allow_partial_failure: bool) -> Result<Self> {
        Self::from_runs(
            cfg.tasks().iter().cloned().map(TaskRun::new),
            allow_partial_failure,
        )
    }

    /// Build from runs in any state.
    ///
    /// Rejects duplicate ids, unknown or self dependencies, and cycles.
    pub fn from_runs<I>(runs: I, allow_partial_failure: bool) -> Result<Self>
    where
        I: IntoIterator<Item = TaskRun>,
    {
        let runs: Vec<TaskRun> = runs.into_iter().collect();

        let mut seen = HashSet::new();
        for run in &runs {
            if !seen.insert(run.task_id().as_str()) {
                return Err(MultijobError::ConfigError(format!(
                    "duplicate task id '{}'",
                    run.task_id()
                )));
            }
        }
        let descriptors: Vec<TaskDescriptor> =
            runs.iter().map(|r| r.descriptor().clone()).collect();
        validate_tasks(&descriptors)?;

        let mut order = Vec::with_capacity(runs.len());
        let mut tasks = HashMap::with_capacity(runs.len());
        let mut dependencies = HashMap::with_capacity(runs.len());
        for run in runs {
            let id = run.task_id().clone();
            dependencies.insert(id.clone(), run.descriptor().depends.clone());
            order.push(id.clone());
            tasks.insert(id, run);
        }

        Ok(Self {
            order,
            tasks,
            dependencies,
            allow_partial_failure,
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn allow_partial_failure(&self) -> bool {
        self.allow_partial_failure
    }

    /// Task ids in config order.
    pub fn task_ids(&self) -> impl Iterator<Item = &TaskId> {
        self.order.iter()
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskRun> {
        self.tasks.get(task_id)
    }

    /// Runs in config order.
    pub fn runs(&self) -> impl Iterator<Item = &TaskRun> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    /// Direct dependencies as declared; empty for unknown ids.
    pub fn dependencies_of(&self, task_id: &str) -> &[TaskId] {
        self.dependencies
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Poll every task whose status is not cached.
    pub async fn refresh(&mut self, service: &dyn JobService) -> Result<()> {
        for id in &self.order {
            if let Some(run) = self.tasks.get_mut(id) {
                run.status(service).await?;
            }
        }
        Ok(())
    }

    /// Statuses of the direct dependencies, in declaration order.
    pub fn dependency_statuses(&self, task_id: &str) -> Vec<ExecutionStatus> {
        self.dependencies_of(task_id)
            .iter()
            .filter_map(|dep| self.tasks.get(dep))
            .map(|run| run.cached_status().clone())
            .collect()
    }

    /// No dependencies, or every one of them `Succeeded`.
    pub fn dependencies_satisfied(&self, task_id: &str) -> bool {
        self.dependency_statuses(task_id)
            .iter()
            .all(|s| *s == ExecutionStatus::Succeeded)
    }

    /// Tasks that may be submitted now, in config order.
    pub fn ready_tasks(&self) -> Vec<TaskId> {
        self.runs()
            .filter(|run| {
                let submittable = *run.cached_status() == ExecutionStatus::Unsubmitted
                    || run.is_retryable();
                submittable && self.dependencies_satisfied(run.task_id())
            })
            .map(|run| run.task_id().clone())
            .collect()
    }

    /// Tasks that failed with their retry budget exhausted.
    pub fn failed_tasks(&self) -> Vec<TaskId> {
        self.runs()
            .filter(|run| run.is_permanently_failed())
            .map(|run| run.task_id().clone())
            .collect()
    }

    /// Tasks with a started job whose status is still being polled.
    pub fn in_flight(&self) -> Vec<TaskId> {
        self.runs()
            .filter(|run| run.is_in_flight())
            .map(|run| run.task_id().clone())
            .collect()
    }

    /// Tasks waiting to be submitted whose dependencies are not satisfied.
    pub fn blocked_tasks(&self) -> Vec<TaskId> {
        self.runs()
            .filter(|run| {
                let waiting = *run.cached_status() == ExecutionStatus::Unsubmitted
                    || run.is_retryable();
                waiting && !self.dependencies_satisfied(run.task_id())
            })
            .map(|run| run.task_id().clone())
            .collect()
    }

    /// Aggregate status.
    ///
    /// `Failed` wins whenever a task failed permanently and partial failure
    /// is not allowed. With partial failure allowed, the pipeline succeeds
    /// once every task has either succeeded or failed permanently. Tasks
    /// downstream of a failure never run, so they keep the pipeline `Running`.
    pub fn pipeline_status(&self) -> PipelineStatus {
        let failed = self.failed_tasks();
        if !failed.is_empty() && !self.allow_partial_failure {
            return PipelineStatus::Failed;
        }

        let settled = self
            .runs()
            .all(|run| run.succeeded() || run.is_permanently_failed());
        if settled {
            return PipelineStatus::Succeeded;
        }

        PipelineStatus::Running
    }

    /// Record a submission for `task_id`.
    pub fn mark_submitted(&mut self, task_id: &str, job_id: JobId) -> Result<()> {
        let run = self.tasks.get_mut(task_id).ok_or_else(|| {
            MultijobError::ConfigError(format!("unknown task '{task_id}'"))
        })?;
        run.mark_submitted(job_id);
        Ok(())
    }
}

impl fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for run in self.runs() {
            let deps = self.dependencies_of(run.task_id());
            write!(f, "{} [{}]", run.task_id(), run.cached_status())?;
            if !deps.is_empty() {
                write!(f, " <- {}", deps.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
