//! Periodic poll-and-notify driver.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::actions::Scanner;
use crate::poller::PollOptions;

/// Spawn the scheduler. The first pass starts immediately, later passes
/// every `period`. Sending `true` (or dropping the sender) stops it between
/// matches; a poll that already started runs to completion.
pub fn spawn_scheduler(
    scanner: Arc<Scanner>,
    period: Duration,
    options: PollOptions,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_secs = period.as_secs(), "Scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = timer.tick() => {
                    run_pass(&scanner, &options, &shutdown).await;
                }
                _ = shutdown.changed() => {
                    break;
                }
            }
        }

        info!("Scheduler shutting down");
    })
}

/// Poll every match once, notifying threats for those that changed.
/// Returns how many matches were visited.
pub async fn run_pass(
    scanner: &Scanner,
    options: &PollOptions,
    shutdown: &watch::Receiver<bool>,
) -> usize {
    let ids = match scanner.db().list_match_ids().await {
        Ok(ids) => ids,
        Err(e) => {
            error!(error = %e, "Failed to list matches");
            return 0;
        }
    };

    let mut visited = 0;
    for id in ids {
        if *shutdown.borrow() {
            debug!("Shutdown requested, ending pass early");
            break;
        }
        if let Err(e) = scanner
            .poll_and_notify(std::slice::from_ref(&id), options)
            .await
        {
            warn!(match_id = %id, error = %e, "Poll pass failed");
        }
        visited += 1;
    }
    visited
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use npscan_core::testing::{SnapshotBuilder, fleet, player, star};

    use super::*;
    use crate::actions::testing::harness;
    use crate::matches::{Credential, Match};

    async fn seeded() -> crate::actions::testing::Harness {
        let h = harness().await;
        let mut m = Match::new("100");
        m.credentials.insert(4, Credential::new(4, "", "k4"));
        h.scanner.db().save_match(&m).await.unwrap();
        h.client.stage(
            "k4",
            SnapshotBuilder::new(4, 1000)
                .player(player(4, "Aburrido"))
                .player(player(6, "Burrito"))
                .star(star(20, 6))
                .fleet(fleet(7, 4, 40, vec![vec![0, 20, 0, 0]]))
                .build(),
        );
        h
    }

    #[tokio::test]
    async fn first_pass_runs_immediately() {
        let h = seeded().await;
        let scanner = Arc::new(h.scanner);
        let (tx, rx) = watch::channel(false);

        let handle = spawn_scheduler(
            scanner.clone(),
            Duration::from_secs(3600),
            PollOptions::default(),
            rx,
        );

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while h.sink.messages().is_empty() {
            assert!(tokio::time::Instant::now() < deadline, "no pass ran");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let m = scanner.db().find_match("100").await.unwrap();
        assert_eq!(m.credentials[&4].latest_snapshot(), Some(1000));
        assert_eq!(h.sink.messages().len(), 1);
    }

    #[tokio::test]
    async fn pass_stops_when_shutdown_is_set() {
        let h = seeded().await;
        let (_tx, rx) = watch::channel(true);

        assert_eq!(run_pass(&h.scanner, &PollOptions::default(), &rx).await, 0);
        let m = h.scanner.db().find_match("100").await.unwrap();
        assert_eq!(m.credentials[&4].latest_snapshot(), None);
    }

    #[tokio::test]
    async fn pass_visits_every_match() {
        let h = seeded().await;
        h.scanner.db().save_match(&Match::new("200")).await.unwrap();
        let (_tx, rx) = watch::channel(false);

        assert_eq!(run_pass(&h.scanner, &PollOptions::default(), &rx).await, 2);
    }

    #[tokio::test]
    async fn dropped_sender_stops_scheduler() {
        let h = harness().await;
        let (tx, rx) = watch::channel(false);
        let handle = spawn_scheduler(
            Arc::new(h.scanner),
            Duration::from_secs(3600),
            PollOptions::default(),
            rx,
        );
        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
