#![allow(dead_code)]

use multijob::config::TaskDescriptor;
use multijob::dag::{DependencyGraph, TaskRun};
use multijob::types::ExecutionStatus;

pub use multijob_test_utils::builders::{ConfigFileBuilder, TaskSectionBuilder, test_settings};
pub use multijob_test_utils::{Call, FakeJobService, init_tracing, with_timeout};

/// A task in a hand-built graph: id, deps, max_retries, retries, status.
pub struct Node<'a> {
    pub id: &'a str,
    pub deps: &'a [&'a str],
    pub max_retries: u32,
    pub retries: u32,
    pub status: ExecutionStatus,
}

pub fn node<'a>(id: &'a str, deps: &'a [&'a str], status: ExecutionStatus) -> Node<'a> {
    Node {
        id,
        deps,
        max_retries: 0,
        retries: 0,
        status,
    }
}

/// Build a graph with tasks in the given states. In-flight nodes get a
/// placeholder job id.
pub fn graph_of(nodes: Vec<Node<'_>>, allow_partial_failure: bool) -> DependencyGraph {
    let runs = nodes.into_iter().map(|n| {
        let descriptor = TaskDescriptor::new(n.id, format!("run {}", n.id))
            .unwrap()
            .with_depends(n.deps.iter().copied())
            .with_max_retries(n.max_retries);
        let job_id = match n.status {
            ExecutionStatus::Unsubmitted => None,
            _ => Some(format!("job-{}", n.id)),
        };
        TaskRun::from_parts(descriptor, job_id, n.retries, n.status)
    });
    DependencyGraph::from_runs(runs, allow_partial_failure).unwrap()
}
