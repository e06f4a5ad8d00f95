// tests/end_to_end.rs

mod common;

use std::io::Write;

use common::{
    Call, ConfigFileBuilder, FakeJobService, TaskSectionBuilder, init_tracing, test_settings,
    with_timeout,
};
use multijob::config::load_and_validate;
use multijob::dag::DependencyGraph;
use multijob::engine::Scheduler;
use multijob::errors::MultijobError;
use multijob::fs::mock::MockFileSystem;
use multijob::run_pipeline;
use multijob::types::{ExecutionStatus as S, GitRef, PipelineStatus};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn retry_then_success_completes_the_pipeline() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_task("A", TaskSectionBuilder::new("run A").build())
        .with_task(
            "B",
            TaskSectionBuilder::new("run B")
                .depends("A")
                .max_retries(1)
                .build(),
        )
        .with_task("C", TaskSectionBuilder::new("run C").depends("A").build())
        .build();

    let service = FakeJobService::new();
    service.script_job("run A", &[S::Queued, S::Running, S::Succeeded]);
    service.script_job("run B", &[S::Running, S::Failed]);
    service.script_job("run B", &[S::Running, S::Succeeded]);

    let settings = test_settings();
    let graph = DependencyGraph::from_config(&cfg, false).unwrap();
    let mut scheduler = Scheduler::new(graph, &service, &settings);

    let status = with_timeout(scheduler.run()).await.unwrap();
    assert_eq!(status, PipelineStatus::Succeeded);

    let graph = scheduler.into_graph();
    let b = graph.task("B").unwrap();
    assert_eq!(b.retries(), 1);
    assert_eq!(*b.cached_status(), S::Succeeded);
    assert_eq!(graph.task("C").unwrap().retries(), 0);

    let commands = service.started_commands();
    assert_eq!(commands.first().map(String::as_str), Some("run A"));
    assert_eq!(commands.iter().filter(|c| *c == "run B").count(), 2);
    assert_eq!(commands.iter().filter(|c| *c == "run C").count(), 1);
}

#[tokio::test]
async fn permanent_error_fails_without_waiting_for_independent_tasks() {
    let cfg = ConfigFileBuilder::new()
        .with_task("A", TaskSectionBuilder::new("run A").build())
        .with_task("Slow", TaskSectionBuilder::new("run Slow").build())
        .build();

    let service = FakeJobService::new();
    service.script_job("run A", &[S::Error]);
    service.script_job("run Slow", &[S::Running]);

    let settings = test_settings();
    let graph = DependencyGraph::from_config(&cfg, false).unwrap();
    let mut scheduler = Scheduler::new(graph, &service, &settings);

    let result = with_timeout(scheduler.run()).await;
    match result {
        Err(MultijobError::PipelineFailed { failed }) => assert_eq!(failed, vec!["A"]),
        other => panic!("expected PipelineFailed, got {other:?}"),
    }
    assert_eq!(scheduler.graph().task("A").unwrap().retries(), 0);
}

#[tokio::test]
async fn partial_failure_lets_the_pipeline_succeed() {
    let cfg = ConfigFileBuilder::new()
        .with_task("A", TaskSectionBuilder::new("run A").build())
        .with_task("B", TaskSectionBuilder::new("run B").build())
        .build();

    let service = FakeJobService::new();
    service.script_job("run A", &[S::Failed]);

    let mut settings = test_settings();
    settings.allow_partial_failure = true;
    let fs = MockFileSystem::new();

    let status = with_timeout(run_pipeline(
        &cfg,
        &service,
        &settings,
        &fs,
        CancellationToken::new(),
    ))
    .await
    .unwrap();
    assert_eq!(status, PipelineStatus::Succeeded);
}

#[tokio::test]
async fn run_pipeline_from_a_task_file_with_epilogue() {
    init_tracing();
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[prepare]
command = "python prepare.py"

[train]
command = "python train.py"
depends = "prepare"
tier = "gpu"
imported_repo_git_refs = "features,tags,v1"
"#
    )
    .unwrap();
    let cfg = load_and_validate(file.path()).unwrap();

    let service = FakeJobService::new();
    service
        .add_tier("gpu", "tier-gpu")
        .add_repository("features", GitRef::new("branches", Some("main".into())))
        .add_dataset("ds-1", "results", "/mnt/data/results")
        .set_snapshot_time_ms(0);
    service.script_job("python train.py", &[S::Queued, S::Running, S::Succeeded]);

    let fs = MockFileSystem::new();
    fs.add_file("/mnt/data/results/old.csv", "stale");
    fs.add_file("/mnt/data/results/inputdata/raw.csv", "keep");

    let mut settings = test_settings();
    settings.prerun_cleanup = true;
    settings.audit = true;

    let status = with_timeout(run_pipeline(
        &cfg,
        &service,
        &settings,
        &fs,
        CancellationToken::new(),
    ))
    .await
    .unwrap();
    assert_eq!(status, PipelineStatus::Succeeded);

    // Cleanup ran before the first submission, audit after the last poll.
    let calls = service.calls();
    let first_start = calls.iter().position(|c| matches!(c, Call::StartJob(_))).unwrap();
    let first_snapshot = calls
        .iter()
        .position(|c| matches!(c, Call::CreateSnapshot { .. }))
        .unwrap();
    assert!(matches!(calls[0], Call::ProjectDatasets));
    assert!(first_start < first_snapshot);

    assert_eq!(
        fs.files(),
        vec![std::path::PathBuf::from("/mnt/data/results/inputdata/raw.csv")]
    );
    assert_eq!(
        service.repository("features").unwrap().git_ref,
        GitRef::new("branches", Some("main".into()))
    );
    assert!(service.tag_names().is_empty());
    assert_eq!(service.comments().len(), 2);
}

#[tokio::test]
async fn audit_is_skipped_when_the_pipeline_fails() {
    let cfg = ConfigFileBuilder::new()
        .with_task("A", TaskSectionBuilder::new("run A").build())
        .build();
    let service = FakeJobService::new();
    service.script_job("run A", &[S::Error]);
    service.add_dataset("ds-1", "results", "/mnt/data/results");

    let mut settings = test_settings();
    settings.audit = true;
    let fs = MockFileSystem::new();

    let result = with_timeout(run_pipeline(
        &cfg,
        &service,
        &settings,
        &fs,
        CancellationToken::new(),
    ))
    .await;
    assert!(matches!(result, Err(MultijobError::PipelineFailed { .. })));
    assert!(
        !service
            .calls()
            .iter()
            .any(|c| matches!(c, Call::CreateSnapshot { .. }))
    );
}
