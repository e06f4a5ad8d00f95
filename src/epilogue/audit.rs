// src/epilogue/audit.rs

//! Post-run audit: snapshot each dataset, tag the snapshot, and leave
//! comments on the triggering job.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Settings;
use crate::engine::poll::poll_until;
use crate::errors::{MultijobError, Result};
use crate::service::JobService;
use crate::types::SnapshotStatus;

/// Snapshot timestamp tag format, e.g. `D05-Mar-2024-T14-07-09`.
pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "D%d-%b-%Y-T%H-%M-%S";

/// Hard line break in job comments.
const BREAK: &str = "\\\n";

/// One dataset as recorded by the audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditedSnapshot {
    pub dataset_id: String,
    pub dataset_name: String,
    pub snapshot_id: String,
    pub timestamp: String,
}

/// UTC snapshot timestamp from epoch milliseconds.
pub fn format_snapshot_timestamp(creation_time_ms: i64) -> Result<String> {
    let created = DateTime::<Utc>::from_timestamp_millis(creation_time_ms).ok_or_else(|| {
        MultijobError::Other(anyhow::anyhow!(
            "snapshot creation time {creation_time_ms} is out of range"
        ))
    })?;
    Ok(created.format(SNAPSHOT_TIMESTAMP_FORMAT).to_string())
}

/// Snapshot tag derived from the triggering job id.
pub fn job_tag(run_id: &str) -> String {
    format!("JOB{run_id}")
}

pub fn snapshot_comment(
    dataset_id: &str,
    dataset_name: &str,
    author: &str,
    timestamp: &str,
) -> String {
    [
        "Controlled execution results snapshot:".to_string(),
        String::new(),
        format!("Dataset ID: {dataset_id}"),
        format!("Dataset name: {dataset_name}"),
        format!("Author MUD ID: {author}"),
        format!("Creation time: {timestamp}"),
    ]
    .join(BREAK)
}

/// Comment listing the captured environment variables, one per line.
pub fn env_vars_comment(vars: &[(String, String)]) -> String {
    let mut comment = format!("Project environment variables:{BREAK}");
    for (name, value) in vars {
        comment.push_str(&format!("{BREAK}{name}: {value}"));
    }
    comment
}

/// Snapshot, tag and comment every dataset, then post the environment
/// comment.
pub async fn audit_run(
    service: &dyn JobService,
    settings: &Settings,
    cancel: &CancellationToken,
) -> Result<Vec<AuditedSnapshot>> {
    let run_id = settings
        .run_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            MultijobError::ConfigError("the post-run audit needs the run id".to_string())
        })?;
    let author = settings.starting_username.as_deref().unwrap_or("unknown");
    let paths = [".".to_string()];

    let datasets = service.project_datasets(&settings.project_id).await?;
    let mut audited = Vec::with_capacity(datasets.len());

    for dataset in &datasets {
        let snapshot = service.create_snapshot(&dataset.id, &paths).await?;
        let timestamp = format_snapshot_timestamp(snapshot.creation_time_ms)?;
        info!(dataset = %dataset.id, snapshot = %snapshot.id, "snapshot requested");

        let snapshot_id = snapshot.id.as_str();
        poll_until(
            settings.snapshot_policy(),
            cancel,
            format!("snapshot {snapshot_id} to become active"),
            move || async move {
                let status = service.snapshot_status(snapshot_id).await?;
                debug!(snapshot = snapshot_id, status = ?status, "waiting for snapshot");
                Ok::<_, MultijobError>((status == SnapshotStatus::Active).then_some(()))
            },
        )
        .await?;

        for tag in [timestamp.clone(), job_tag(run_id)] {
            service
                .tag_snapshot(&dataset.id, &snapshot.id, &tag)
                .await?;
        }

        let dataset_name = service.dataset_name(&snapshot.dataset_id).await?;
        let comment = snapshot_comment(&snapshot.dataset_id, &dataset_name, author, &timestamp);
        service.post_job_comment(run_id, &comment).await?;
        info!(dataset = %dataset.id, snapshot = %snapshot.id, %timestamp, "snapshot audited");

        audited.push(AuditedSnapshot {
            dataset_id: snapshot.dataset_id.clone(),
            dataset_name,
            snapshot_id: snapshot.id.clone(),
            timestamp,
        });
    }

    service
        .post_job_comment(run_id, &env_vars_comment(&settings.audit_env))
        .await?;
    Ok(audited)
}
