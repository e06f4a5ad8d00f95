// tests/dag_graph.rs

mod common;

use common::{ConfigFileBuilder, FakeJobService, TaskSectionBuilder, graph_of, node, Node};
use multijob::dag::{DependencyGraph, TaskRun};
use multijob::config::TaskDescriptor;
use multijob::types::{ExecutionStatus as S, PipelineStatus};

#[test]
fn fresh_graph_only_roots_are_ready() {
    let cfg = ConfigFileBuilder::new()
        .with_task("A", TaskSectionBuilder::new("a").build())
        .with_task("B", TaskSectionBuilder::new("b").depends("A").build())
        .with_task("C", TaskSectionBuilder::new("c").depends("A").build())
        .with_task("D", TaskSectionBuilder::new("d").build())
        .build();
    let graph = DependencyGraph::from_config(&cfg, false).unwrap();

    assert_eq!(graph.ready_tasks(), vec!["A", "D"]);
    assert_eq!(graph.pipeline_status(), PipelineStatus::Running);
    assert!(graph.failed_tasks().is_empty());
}

#[test]
fn dependency_statuses_preserve_order_and_duplicates() {
    let graph = graph_of(
        vec![
            node("A", &[], S::Succeeded),
            node("B", &[], S::Running),
            node("C", &["B", "A", "B"], S::Unsubmitted),
        ],
        false,
    );
    assert_eq!(
        graph.dependency_statuses("C"),
        vec![S::Running, S::Succeeded, S::Running]
    );
    assert!(!graph.dependencies_satisfied("C"));
    assert!(graph.dependencies_satisfied("A"));
}

#[test]
fn only_succeeded_satisfies_a_dependency() {
    for status in [S::Stopped, S::Running, S::Preparing, S::Submitted, S::Other("Weird".into())] {
        let graph = graph_of(
            vec![node("A", &[], status.clone()), node("B", &["A"], S::Unsubmitted)],
            false,
        );
        assert!(graph.ready_tasks().is_empty(), "{status} should not unblock B");
    }
}

#[test]
fn failed_task_with_budget_is_ready_again() {
    let graph = graph_of(
        vec![Node {
            id: "A",
            deps: &[],
            max_retries: 2,
            retries: 1,
            status: S::Error,
        }],
        false,
    );
    assert_eq!(graph.ready_tasks(), vec!["A"]);
    assert!(graph.failed_tasks().is_empty());
    assert_eq!(graph.pipeline_status(), PipelineStatus::Running);
}

#[test]
fn exhausted_budget_is_permanent_failure() {
    let graph = graph_of(
        vec![
            Node {
                id: "A",
                deps: &[],
                max_retries: 1,
                retries: 1,
                status: S::Failed,
            },
            node("B", &[], S::Running),
        ],
        false,
    );
    assert!(graph.ready_tasks().is_empty());
    assert_eq!(graph.failed_tasks(), vec!["A"]);
    // Failed wins even while B is still running.
    assert_eq!(graph.pipeline_status(), PipelineStatus::Failed);
}

#[test]
fn all_succeeded_is_succeeded() {
    let graph = graph_of(
        vec![node("A", &[], S::Succeeded), node("B", &["A"], S::Succeeded)],
        false,
    );
    assert_eq!(graph.pipeline_status(), PipelineStatus::Succeeded);
}

#[test]
fn partial_failure_allows_success_with_independent_failure() {
    let nodes = || {
        vec![
            node("A", &[], S::Error),
            node("B", &[], S::Succeeded),
            node("C", &["B"], S::Succeeded),
        ]
    };
    assert_eq!(graph_of(nodes(), false).pipeline_status(), PipelineStatus::Failed);
    assert_eq!(graph_of(nodes(), true).pipeline_status(), PipelineStatus::Succeeded);
}

#[test]
fn partial_failure_keeps_running_while_dependents_never_ran() {
    let graph = graph_of(
        vec![node("A", &[], S::Failed), node("B", &["A"], S::Unsubmitted)],
        true,
    );
    assert_eq!(graph.pipeline_status(), PipelineStatus::Running);
    assert!(graph.ready_tasks().is_empty());
    assert_eq!(graph.blocked_tasks(), vec!["B".to_string()]);

    let chained = graph_of(
        vec![
            node("A", &[], S::Failed),
            node("B", &["A"], S::Unsubmitted),
            node("C", &["B"], S::Unsubmitted),
            node("D", &[], S::Succeeded),
        ],
        true,
    );
    assert_eq!(chained.pipeline_status(), PipelineStatus::Running);

    let still_running = graph_of(
        vec![node("A", &[], S::Failed), node("D", &[], S::Running)],
        true,
    );
    assert_eq!(still_running.pipeline_status(), PipelineStatus::Running);
}

#[test]
fn stopped_dependency_blocks_forever() {
    let graph = graph_of(
        vec![node("A", &[], S::Stopped), node("B", &["A"], S::Unsubmitted)],
        false,
    );
    assert_eq!(graph.pipeline_status(), PipelineStatus::Running);
    assert!(graph.in_flight().is_empty());
    assert_eq!(graph.blocked_tasks(), vec!["B"]);
}

#[test]
fn from_runs_rejects_duplicates_and_unknown_deps() {
    let a = || TaskRun::new(TaskDescriptor::new("A", "a").unwrap());
    assert!(DependencyGraph::from_runs(vec![a(), a()], false).is_err());

    let orphan = TaskRun::new(
        TaskDescriptor::new("B", "b")
            .unwrap()
            .with_depends(["missing"]),
    );
    assert!(DependencyGraph::from_runs(vec![a(), orphan], false).is_err());
}

#[tokio::test]
async fn cached_statuses_are_not_polled() {
    let service = FakeJobService::new();
    let mut graph = graph_of(
        vec![
            node("A", &[], S::Succeeded),
            node("B", &[], S::Failed),
            node("C", &[], S::Unsubmitted),
            node("D", &[], S::Stopped),
        ],
        false,
    );
    graph.refresh(&service).await.unwrap();
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn in_flight_statuses_are_polled_until_cached() {
    let service = FakeJobService::new();
    service.script_job("run A", &[S::Running, S::Succeeded]);
    let job_id = multijob::service::JobService::start_job(
        &service,
        &multijob::service::StartJobRequest {
            project_id: "p".into(),
            command_to_run: "run A".into(),
            override_hardware_tier_id: None,
            environment_id: None,
            main_repo_git_ref: None,
        },
    )
    .await
    .unwrap();

    let mut run = TaskRun::new(TaskDescriptor::new("A", "run A").unwrap());
    run.mark_submitted(job_id);
    assert_eq!(run.status(&service).await.unwrap(), S::Running);
    assert!(run.is_complete(&service).await.unwrap());
    // Succeeded is cached: no further polls.
    assert!(run.is_complete(&service).await.unwrap());

    let polls = service
        .calls()
        .iter()
        .filter(|c| matches!(c, common::Call::JobStatus(_)))
        .count();
    assert_eq!(polls, 2);
}

#[test]
fn resubmission_after_failure_counts_a_retry() {
    let descriptor = TaskDescriptor::new("A", "a").unwrap().with_max_retries(1);
    let mut run = TaskRun::from_parts(descriptor, Some("job-1".into()), 0, S::Failed);
    assert!(run.is_retryable());

    run.mark_submitted("job-2".into());
    assert_eq!(run.retries(), 1);
    assert_eq!(run.job_id(), Some("job-2"));
    assert_eq!(*run.cached_status(), S::Submitted);
}
