// src/lib.rs

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod dag;
pub mod engine;
pub mod epilogue;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod service;
pub mod types;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, Settings, load_and_validate};
use crate::dag::DependencyGraph;
use crate::engine::Scheduler;
use crate::epilogue::ControlledExecutionEpilogue;
use crate::fs::{FileSystem, RealFileSystem};
use crate::service::{HttpJobService, JobService};
use crate::types::PipelineStatus;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - task file loading and validation
/// - settings from flags and environment
/// - the HTTP job service
/// - Ctrl-C handling
/// - epilogue, graph and scheduler (see [`run_pipeline`])
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let settings = Settings::from_args(&args)?;
    settings.validate()?;

    let service = HttpJobService::new(&settings.api_host, &settings.api_key);

    // Ctrl-C → cancel every pending wait.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; cancelling");
            cancel.cancel();
        });
    }

    let status = run_pipeline(&cfg, &service, &settings, &RealFileSystem, cancel).await?;
    info!(%status, "multijob finished");
    Ok(())
}

/// Pre-run cleanup, the scheduling loop, then the post-run audit.
///
/// The audit only runs once the pipeline has succeeded.
pub async fn run_pipeline(
    cfg: &ConfigFile,
    service: &dyn JobService,
    settings: &Settings,
    fs: &dyn FileSystem,
    cancel: CancellationToken,
) -> errors::Result<PipelineStatus> {
    let epilogue =
        ControlledExecutionEpilogue::new(service, settings, fs).with_cancellation(cancel.clone());
    if let Some(removed) = epilogue.pre_run().await? {
        info!(removed, "pre-run cleanup done");
    }

    let graph = DependencyGraph::from_config(cfg, settings.allow_partial_failure)?;
    let mut scheduler = Scheduler::new(graph, service, settings).with_cancellation(cancel);
    let status = scheduler.run().await?;

    if let Some(audited) = epilogue.post_run().await? {
        info!(datasets = audited.len(), "post-run audit done");
    }
    Ok(status)
}

/// Simple dry-run output: print tasks, deps, commands and overrides.
fn print_dry_run(cfg: &ConfigFile) {
    println!("multijob dry-run");
    println!();

    println!("tasks ({}):", cfg.tasks().len());
    for task in cfg.tasks() {
        println!("  - {}", task.task_id);
        println!("      command: {}", task.command);
        if !task.depends.is_empty() {
            println!("      depends: {:?}", task.depends);
        }
        if task.max_retries > 0 {
            println!("      max_retries: {}", task.max_retries);
        }
        if let Some(ref tier) = task.tier {
            println!("      tier: {tier}");
        }
        if let Some(ref env) = task.environment {
            println!("      environment: {env}");
        }
        if let Some(ref git_ref) = task.project_repo_git_ref {
            println!("      project_repo_git_ref: {git_ref}");
        }
        if let Some(ref overrides) = task.imported_repo_git_refs {
            for o in overrides {
                println!("      imported_repo_git_ref: {o}");
            }
        }
    }

    debug!("dry-run complete (no submission)");
}
