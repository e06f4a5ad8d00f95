//! Fixed-interval polling with an optional deadline and cancellation.
//!
//! Every suspension point in the crate (lock gate, admission gate, job
//! startup wait, snapshot wait) is a sleep-then-repoll loop built on
//! [`Poller`] or [`poll_until`].

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use crate::errors::{MultijobError, Result};

/// How often to re-poll, and for how long at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` waits forever.
    pub deadline: Option<Duration>,
}

impl PollPolicy {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Sleeps between polls of one wait loop.
#[derive(Debug)]
pub struct Poller<'a> {
    policy: PollPolicy,
    cancel: &'a CancellationToken,
    what: String,
    started: Instant,
    attempts: u64,
}

impl<'a> Poller<'a> {
    /// `what` names the awaited condition in errors and logs.
    pub fn new(policy: PollPolicy, cancel: &'a CancellationToken, what: impl Into<String>) -> Self {
        Self {
            policy,
            cancel,
            what: what.into(),
            started: Instant::now(),
            attempts: 0,
        }
    }

    /// Number of completed waits.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Sleep one interval.
    ///
    /// Fails with [`MultijobError::WaitDeadlineExceeded`] once the deadline
    /// has passed, and with [`MultijobError::Cancelled`] as soon as the token
    /// fires.
    pub async fn wait(&mut self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(self.cancelled());
        }
        if let Some(deadline) = self.policy.deadline {
            if self.started.elapsed() >= deadline {
                return Err(MultijobError::WaitDeadlineExceeded {
                    what: self.what.clone(),
                });
            }
        }

        let cancel = self.cancel;
        tokio::select! {
            _ = cancel.cancelled() => return Err(self.cancelled()),
            _ = sleep(self.policy.interval) => {}
        }
        self.attempts += 1;
        Ok(())
    }

    fn cancelled(&self) -> MultijobError {
        MultijobError::Cancelled {
            what: self.what.clone(),
        }
    }
}

/// Run `probe` until it yields `Some`, sleeping one interval between tries.
///
/// The first probe runs immediately.
pub async fn poll_until<T, F, Fut>(
    policy: PollPolicy,
    cancel: &CancellationToken,
    what: impl Into<String>,
    mut probe: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let mut poller = Poller::new(policy, cancel, what);
    loop {
        if let Some(value) = probe().await? {
            return Ok(value);
        }
        poller.wait().await?;
    }
}
