// tests/poll_utility.rs

use std::cell::Cell;
use std::time::Duration;

use multijob::engine::{PollPolicy, Poller, poll_until};
use multijob::errors::MultijobError;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn poll_until_returns_first_some() {
    let cancel = CancellationToken::new();
    let probes = Cell::new(0u32);

    let value = poll_until(
        PollPolicy::every(Duration::from_millis(1)),
        &cancel,
        "the third probe",
        || {
            probes.set(probes.get() + 1);
            let n = probes.get();
            async move { Ok::<_, MultijobError>((n == 3).then_some(n * 10)) }
        },
    )
    .await
    .unwrap();

    assert_eq!(value, 30);
    assert_eq!(probes.get(), 3);
}

#[tokio::test]
async fn probe_errors_propagate() {
    let cancel = CancellationToken::new();
    let result: Result<(), _> = poll_until(
        PollPolicy::every(Duration::from_millis(1)),
        &cancel,
        "nothing",
        || async { Err::<Option<()>, _>(MultijobError::ConfigError("boom".into())) },
    )
    .await;
    assert!(matches!(result, Err(MultijobError::ConfigError(_))));
}

#[tokio::test]
async fn deadline_bounds_the_wait() {
    let cancel = CancellationToken::new();
    let policy = PollPolicy::every(Duration::from_millis(2))
        .with_deadline(Some(Duration::from_millis(10)));

    let result: Result<(), _> = poll_until(policy, &cancel, "a condition that never holds", || async {
        Ok::<_, MultijobError>(None)
    })
    .await;

    match result {
        Err(MultijobError::WaitDeadlineExceeded { what }) => {
            assert_eq!(what, "a condition that never holds")
        }
        other => panic!("expected WaitDeadlineExceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_token_stops_waiting_immediately() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut poller = Poller::new(PollPolicy::every(Duration::from_secs(3600)), &cancel, "never");
    assert!(matches!(
        poller.wait().await,
        Err(MultijobError::Cancelled { .. })
    ));
    assert_eq!(poller.attempts(), 0);
}

#[tokio::test]
async fn cancellation_wakes_a_sleeping_poller() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let mut poller = Poller::new(PollPolicy::every(Duration::from_secs(3600)), &cancel, "never");
    let result = tokio::time::timeout(Duration::from_secs(5), poller.wait())
        .await
        .expect("cancellation did not wake the poller");
    assert!(matches!(result, Err(MultijobError::Cancelled { .. })));
}
