// src/epilogue/mod.rs

//! Controlled-execution housekeeping around the main run.
//!
//! Both phases are opt-in through [`Settings`]: `prerun_cleanup` empties the
//! project's datasets (except the protected input directory) before
//! scheduling, `audit` snapshots and annotates them afterwards.

pub mod audit;
pub mod cleanup;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Settings;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::service::JobService;

pub use audit::AuditedSnapshot;

pub struct ControlledExecutionEpilogue<'a> {
    service: &'a dyn JobService,
    settings: &'a Settings,
    fs: &'a dyn FileSystem,
    cancel: CancellationToken,
}

impl<'a> ControlledExecutionEpilogue<'a> {
    pub fn new(service: &'a dyn JobService, settings: &'a Settings, fs: &'a dyn FileSystem) -> Self {
        Self {
            service,
            settings,
            fs,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Dataset cleanup, if enabled. Returns the number of files removed.
    pub async fn pre_run(&self) -> Result<Option<usize>> {
        if !self.settings.prerun_cleanup {
            debug!("pre-run cleanup disabled");
            return Ok(None);
        }
        info!(protected = %self.settings.protected_dir, "cleaning project datasets");
        let removed = cleanup::cleanup_datasets(
            self.service,
            self.fs,
            &self.settings.project_id,
            &self.settings.protected_dir,
        )
        .await?;
        Ok(Some(removed))
    }

    /// Snapshot audit, if enabled.
    pub async fn post_run(&self) -> Result<Option<Vec<AuditedSnapshot>>> {
        if !self.settings.audit {
            debug!("post-run audit disabled");
            return Ok(None);
        }
        info!("auditing project datasets");
        let audited = audit::audit_run(self.service, self.settings, &self.cancel).await?;
        Ok(Some(audited))
    }
}
