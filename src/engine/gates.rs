// src/engine/gates.rs

//! Admission and lock gates run at the top of each scheduler tick.
//!
//! [`lock_present`] and [`queued_job_count`] are single, non-blocking
//! queries. The `wait_for_*` functions wrap them in a [`Poller`] loop.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::AdvisoryLock;
use crate::engine::poll::{PollPolicy, Poller};
use crate::errors::Result;
use crate::service::JobService;

/// Whether the advisory lock tag is on the project.
pub async fn lock_present(lock: &AdvisoryLock<'_>) -> Result<bool> {
    Ok(lock.is_held().await?)
}

/// Number of queued jobs in the project.
pub async fn queued_job_count(service: &dyn JobService, project_id: &str) -> Result<u64> {
    Ok(service.queued_job_count(project_id).await?)
}

/// Block until the lock tag is absent.
///
/// With a `lease`, a tag observed continuously for longer than the lease is
/// deleted and the gate opens. Without one, the gate waits for as long as the
/// poll policy allows.
pub async fn wait_for_unlock(
    lock: &AdvisoryLock<'_>,
    policy: PollPolicy,
    cancel: &CancellationToken,
    lease: Option<Duration>,
) -> Result<()> {
    let mut poller = Poller::new(
        policy,
        cancel,
        format!("advisory lock tag '{}' to be removed", lock.tag()),
    );
    // (tag id, first time we saw that tag)
    let mut observed: Option<(String, Instant)> = None;

    loop {
        let Some(holder) = lock.holder().await? else {
            if poller.attempts() > 0 {
                info!(tag = lock.tag(), waited = ?poller.elapsed(), "advisory lock cleared");
            }
            return Ok(());
        };

        let since = match &observed {
            Some((id, at)) if *id == holder.id => *at,
            _ => {
                let now = Instant::now();
                observed = Some((holder.id.clone(), now));
                now
            }
        };

        if poller.attempts() == 0 {
            match lease {
                Some(lease) => info!(
                    tag = lock.tag(),
                    lease = ?lease,
                    "advisory lock held; waiting (stale tags are removed after the lease)"
                ),
                None => warn!(
                    tag = lock.tag(),
                    "advisory lock held; waiting. If no other scheduler is submitting, the \
                     tag is stale: check the imported repository refs in the project settings, \
                     then delete the tag"
                ),
            }
        }

        if let Some(lease) = lease {
            if since.elapsed() >= lease {
                lock.force_release(&holder).await?;
                return Ok(());
            }
        }

        debug!(tag = lock.tag(), attempts = poller.attempts(), "lock gate closed");
        poller.wait().await?;
    }
}

/// Block until fewer than `limit` jobs are queued; returns the last count.
pub async fn wait_for_queue_space(
    service: &dyn JobService,
    project_id: &str,
    limit: u64,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut poller = Poller::new(policy, cancel, "queue space");
    loop {
        let queued = queued_job_count(service, project_id).await?;
        if queued < limit {
            return Ok(queued);
        }
        info!(queued, limit, "At limit for queued jobs, waiting for queue space.");
        poller.wait().await?;
    }
}
