//! Project-tag advisory lock.
//!
//! The lock is a tag on the remote project. Holding it means "the shared
//! repository ref configuration is being swapped". Nothing enforces it; every
//! participant checks for the tag before submitting.
//!
//! The tag carries no lease. If a holder dies between acquire and release the
//! tag stays behind. Manual recovery: restore the imported repository refs in
//! the project settings, then delete the tag from the project.

use tracing::{debug, info, warn};

use crate::service::{JobService, ProjectTag, Result};

/// Proof of acquisition; must be passed back to [`AdvisoryLock::release`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a held lock blocks every scheduler in the project until released"]
pub struct LockHandle {
    tag_id: String,
}

impl LockHandle {
    pub fn tag_id(&self) -> &str {
        &self.tag_id
    }
}

#[derive(Clone, Copy)]
pub struct AdvisoryLock<'a> {
    service: &'a dyn JobService,
    project_id: &'a str,
    tag: &'a str,
}

impl<'a> AdvisoryLock<'a> {
    pub fn new(service: &'a dyn JobService, project_id: &'a str, tag: &'a str) -> Self {
        Self {
            service,
            project_id,
            tag,
        }
    }

    pub fn tag(&self) -> &str {
        self.tag
    }

    /// The lock tag as currently attached to the project, if any.
    pub async fn holder(&self) -> Result<Option<ProjectTag>> {
        let tags = self.service.project_tags(self.project_id).await?;
        Ok(tags.into_iter().find(|t| t.name == self.tag))
    }

    /// Whether the lock tag is present. Does not block.
    pub async fn is_held(&self) -> Result<bool> {
        Ok(self.holder().await?.is_some())
    }

    pub async fn acquire(&self) -> Result<LockHandle> {
        let tag_id = self
            .service
            .create_project_tag(self.project_id, self.tag)
            .await?;
        info!(tag = self.tag, tag_id = %tag_id, "advisory lock acquired");
        Ok(LockHandle { tag_id })
    }

    pub async fn release(&self, handle: LockHandle) -> Result<()> {
        self.service
            .delete_project_tag(self.project_id, &handle.tag_id)
            .await?;
        info!(tag = self.tag, tag_id = %handle.tag_id, "advisory lock released");
        Ok(())
    }

    /// Remove a tag this process did not create (stale lease).
    pub async fn force_release(&self, holder: &ProjectTag) -> Result<()> {
        warn!(
            tag = self.tag,
            tag_id = %holder.id,
            "force-releasing advisory lock held past its lease"
        );
        self.service
            .delete_project_tag(self.project_id, &holder.id)
            .await?;
        debug!(tag = self.tag, "stale lock tag deleted");
        Ok(())
    }
}
