//! Midnight rollover scheduler.
//!
//! Sleeps until the next local midnight in the service's reference time
//! zone, rolls over the day that just ended, and re-arms for the following
//! midnight. The next delay is recomputed from the calendar on every arm, so
//! days that are 23 or 25 hours long fire at the right wall time.
//!
//! # Graceful Shutdown
//!
//! `stop` cancels the pending timer. A rollover that is already running is
//! allowed to finish; the loop exits right after it instead of re-arming.

use crate::calendar;
use crate::clock::Clock;
use crate::services::RolloverService;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Timer armed for `next_fire`.
    Waiting { next_fire: DateTime<Utc> },
    /// Rolling over `target_date`.
    Running { target_date: NaiveDate },
    /// Loop has exited.
    Stopped,
}

/// Handle to a running midnight scheduler.
pub struct RolloverScheduler {
    cancel_token: CancellationToken,
    state_rx: watch::Receiver<SchedulerState>,
    handle: JoinHandle<()>,
}

impl RolloverScheduler {
    /// Arm the timer for the next local midnight and spawn the loop.
    ///
    /// If the first midnight cannot be computed the scheduler starts out
    /// `Stopped`.
    pub fn start(service: Arc<RolloverService>, clock: Arc<dyn Clock>) -> Self {
        Self::start_with_token(service, clock, CancellationToken::new())
    }

    /// Like [`RolloverScheduler::start`], stopping when `cancel_token` is cancelled.
    pub fn start_with_token(
        service: Arc<RolloverService>,
        clock: Arc<dyn Clock>,
        cancel_token: CancellationToken,
    ) -> Self {
        let tz = service.time_zone();
        let first_fire = match calendar::next_local_midnight(clock.now(), tz) {
            Ok(next_fire) => Some(next_fire),
            Err(e) => {
                error!(
                    target: "rollover.task.scheduler",
                    error = %e,
                    "Unable to arm rollover scheduler"
                );
                None
            }
        };

        let initial = first_fire
            .map(|next_fire| SchedulerState::Waiting { next_fire })
            .unwrap_or(SchedulerState::Stopped);
        let (state_tx, state_rx) = watch::channel(initial);

        let handle = match first_fire {
            Some(next_fire) => {
                info!(
                    target: "rollover.task.scheduler",
                    time_zone = tz.name(),
                    next_fire = %next_fire,
                    "Starting rollover scheduler"
                );
                tokio::spawn(
                    run_loop(service, clock, cancel_token.clone(), state_tx, next_fire)
                        .instrument(tracing::info_span!("rollover.task.scheduler")),
                )
            }
            None => tokio::spawn(async {}),
        };

        Self {
            cancel_token,
            state_rx,
            handle,
        }
    }

    /// Current state.
    pub fn state(&self) -> SchedulerState {
        *self.state_rx.borrow()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state_rx.clone()
    }

    /// Cancel the pending timer. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    /// Wait for the loop to exit.
    ///
    /// # Errors
    ///
    /// Returns the `JoinError` if the loop task panicked or was aborted.
    pub async fn join(self) -> Result<(), JoinError> {
        self.handle.await
    }

    /// Stop and wait for the loop to exit.
    ///
    /// # Errors
    ///
    /// Returns the `JoinError` if the loop task panicked or was aborted.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        self.stop();
        self.join().await
    }
}

async fn run_loop(
    service: Arc<RolloverService>,
    clock: Arc<dyn Clock>,
    cancel_token: CancellationToken,
    state_tx: watch::Sender<SchedulerState>,
    mut next_fire: DateTime<Utc>,
) {
    let tz = service.time_zone();

    loop {
        state_tx.send_replace(SchedulerState::Waiting { next_fire });

        let delay = calendar::delay_until(clock.now(), next_fire);
        info!(
            target: "rollover.task.scheduler",
            next_fire = %next_fire,
            delay_seconds = delay.as_secs(),
            "Rollover timer armed"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel_token.cancelled() => {
                info!(
                    target: "rollover.task.scheduler",
                    "Rollover scheduler received shutdown signal while waiting, exiting"
                );
                break;
            }
        }

        // Clamp so a wake ahead of the wall clock still targets the day that
        // just ended.
        let fired_at = clock.now().max(next_fire);

        match calendar::previous_local_date(fired_at, tz) {
            Ok(target_date) => {
                info!(
                    target: "rollover.task.scheduler",
                    fired_at = %fired_at,
                    target_date = %target_date,
                    "Rollover timer fired"
                );
                state_tx.send_replace(SchedulerState::Running { target_date });
                service.run_scheduled(target_date).await;
            }
            Err(e) => {
                error!(
                    target: "rollover.task.scheduler",
                    fired_at = %fired_at,
                    error = %e,
                    "Unable to determine rollover date"
                );
            }
        }

        if cancel_token.is_cancelled() {
            info!(
                target: "rollover.task.scheduler",
                "Rollover scheduler received shutdown signal during run, exiting"
            );
            break;
        }

        // Re-arm from the live clock: a run that outlasts the next midnight
        // skips that day instead of firing late.
        let settled_at = clock.now().max(fired_at);
        next_fire = match calendar::next_local_midnight(settled_at, tz) {
            Ok(next) => next,
            Err(e) => {
                error!(
                    target: "rollover.task.scheduler",
                    settled_at = %settled_at,
                    error = %e,
                    "Unable to re-arm rollover scheduler"
                );
                break;
            }
        };
    }

    state_tx.send_replace(SchedulerState::Stopped);
    info!(target: "rollover.task.scheduler", "Rollover scheduler stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::models::{Bed, BedStatus};
    use crate::services::rollover_store::mock::{AssessmentRecord, FailPoint, InMemoryRolloverStore};
    use chrono::TimeDelta;
    use chrono_tz::America::{New_York, Sao_Paulo};
    use chrono_tz::Tz;
    use std::time::Duration;
    use uuid::Uuid;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn date(s: &str) -> NaiveDate {
        calendar::parse_target_date(s).unwrap()
    }

    fn occupied_bed() -> Bed {
        Bed {
            bed_id: Uuid::new_v4(),
            bed_number: "101".to_string(),
            status: BedStatus::Occupied,
        }
    }

    fn start(
        store: &Arc<InMemoryRolloverStore>,
        tz: Tz,
        anchor: &str,
    ) -> (RolloverScheduler, Arc<TokioClock>) {
        let clock = Arc::new(TokioClock::starting_at(utc(anchor)));
        let service = Arc::new(RolloverService::new(store.clone(), tz));
        (RolloverScheduler::start(service, clock.clone()), clock)
    }

    async fn wait_for_state(rx: &mut watch::Receiver<SchedulerState>, expected: SchedulerState) {
        let _ = rx.wait_for(|s| *s == expected).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_at_local_midnight_and_rearms() {
        let bed = occupied_bed();
        let store = Arc::new(
            InMemoryRolloverStore::new()
                .with_bed(bed.clone())
                .with_assessment(
                    AssessmentRecord::new(date("2026-10-13"), "fugulin").with_bed(bed.bed_id),
                )
                .with_assessment(
                    AssessmentRecord::new(date("2026-10-14"), "fugulin").with_bed(bed.bed_id),
                ),
        );
        // 23:59 local time in Sao Paulo.
        let (scheduler, clock) = start(&store, Sao_Paulo, "2026-10-14T02:59:00Z");
        let first_fire = utc("2026-10-14T03:00:00Z");

        assert_eq!(
            scheduler.state(),
            SchedulerState::Waiting {
                next_fire: first_fire
            }
        );

        let mut rx = scheduler.subscribe();
        let second_fire = utc("2026-10-15T03:00:00Z");
        wait_for_state(
            &mut rx,
            SchedulerState::Waiting {
                next_fire: second_fire,
            },
        )
        .await;

        let fired_after = clock.now() - first_fire;
        assert!(fired_after >= TimeDelta::zero());
        assert!(fired_after < TimeDelta::seconds(1));
        assert_eq!(second_fire - first_fire, TimeDelta::hours(24));

        // Only the day that just ended was rolled over.
        let snapshots = store.snapshots().await;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].snapshot.window_start, utc("2026-10-13T03:00:00Z"));
        assert_eq!(store.bed(bed.bed_id).await.map(|b| b.status), Some(BedStatus::Pending));

        scheduler.shutdown().await.unwrap();
        assert_eq!(*rx.borrow(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spring_forward_day_fires_at_wall_midnight() {
        let bed = occupied_bed();
        let store = Arc::new(
            InMemoryRolloverStore::new()
                .with_bed(bed.clone())
                .with_assessment(
                    AssessmentRecord::new(date("2026-03-08"), "fugulin").with_bed(bed.bed_id),
                ),
        );
        // 00:30 EST on the 23-hour day.
        let (scheduler, clock) = start(&store, New_York, "2026-03-08T05:30:00Z");
        let first_fire = utc("2026-03-09T04:00:00Z");

        assert_eq!(
            scheduler.state(),
            SchedulerState::Waiting {
                next_fire: first_fire
            }
        );
        assert_eq!(
            calendar::delay_until(clock.now(), first_fire),
            Duration::from_secs(22 * 3600 + 30 * 60)
        );

        let mut rx = scheduler.subscribe();
        wait_for_state(
            &mut rx,
            SchedulerState::Waiting {
                next_fire: utc("2026-03-10T04:00:00Z"),
            },
        )
        .await;

        let snapshots = store.snapshots().await;
        assert_eq!(snapshots.len(), 1);
        let window_length = snapshots[0].snapshot.window_end - snapshots[0].snapshot.window_start;
        assert_eq!(window_length, TimeDelta::hours(23) - TimeDelta::milliseconds(1));

        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_waiting_never_runs() {
        let store = Arc::new(InMemoryRolloverStore::new().with_bed(occupied_bed()));
        let (scheduler, _clock) = start(&store, Sao_Paulo, "2026-10-13T15:00:00Z");
        let rx = scheduler.subscribe();

        scheduler.stop();
        scheduler.stop();
        scheduler.join().await.unwrap();

        assert_eq!(*rx.borrow(), SchedulerState::Stopped);
        assert_eq!(store.find_calls().await, 0);
        assert_eq!(store.beds().await[0].status, BedStatus::Occupied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_run_lets_it_finish() {
        let store = Arc::new(
            InMemoryRolloverStore::new()
                .with_bed(occupied_bed())
                .with_assessment(AssessmentRecord::new(date("2026-10-13"), "fugulin"))
                .with_latency(Duration::from_secs(10)),
        );
        let (scheduler, _clock) = start(&store, Sao_Paulo, "2026-10-14T02:59:00Z");
        let mut rx = scheduler.subscribe();

        wait_for_state(
            &mut rx,
            SchedulerState::Running {
                target_date: date("2026-10-13"),
            },
        )
        .await;
        scheduler.stop();
        scheduler.join().await.unwrap();

        assert_eq!(*rx.borrow(), SchedulerState::Stopped);
        assert_eq!(store.find_calls().await, 1);
        assert_eq!(store.beds().await[0].status, BedStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_run_keeps_schedule() {
        let store = Arc::new(
            InMemoryRolloverStore::new()
                .with_bed(occupied_bed())
                .with_fail_point(FailPoint::FindAssessments),
        );
        let (scheduler, _clock) = start(&store, Sao_Paulo, "2026-10-14T02:59:00Z");
        let mut rx = scheduler.subscribe();

        wait_for_state(
            &mut rx,
            SchedulerState::Waiting {
                next_fire: utc("2026-10-15T03:00:00Z"),
            },
        )
        .await;
        assert_eq!(store.find_calls().await, 1);
        assert_eq!(store.beds().await[0].status, BedStatus::Occupied);

        store.set_fail_point(None).await;
        wait_for_state(
            &mut rx,
            SchedulerState::Waiting {
                next_fire: utc("2026-10-16T03:00:00Z"),
            },
        )
        .await;
        assert_eq!(store.find_calls().await, 2);
        assert_eq!(store.beds().await[0].status, BedStatus::Pending);

        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_past_midnight_rearms_for_following_midnight() {
        // Three store calls at 9h each: the run settles at 2026-10-15T06:00Z,
        // three hours after the midnight that ends 2026-10-14.
        let store = Arc::new(
            InMemoryRolloverStore::new()
                .with_bed(occupied_bed())
                .with_latency(Duration::from_secs(9 * 3600)),
        );
        let (scheduler, clock) = start(&store, Sao_Paulo, "2026-10-14T02:59:00Z");
        let mut rx = scheduler.subscribe();

        let next_fire = utc("2026-10-16T03:00:00Z");
        wait_for_state(&mut rx, SchedulerState::Waiting { next_fire }).await;

        let settled_after = clock.now() - utc("2026-10-15T06:00:00Z");
        assert!(settled_after >= TimeDelta::zero());
        assert!(settled_after < TimeDelta::seconds(1));
        assert_eq!(store.find_calls().await, 1);

        // The skipped day is not replayed; the next run covers the day that
        // ends at the armed midnight.
        wait_for_state(
            &mut rx,
            SchedulerState::Running {
                target_date: date("2026-10-15"),
            },
        )
        .await;
        let fired_after = clock.now() - next_fire;
        assert!(fired_after >= TimeDelta::zero());
        assert!(fired_after < TimeDelta::seconds(1));

        scheduler.stop();
        scheduler.join().await.unwrap();
        assert_eq!(store.find_calls().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_token_stops_scheduler() {
        let store = Arc::new(InMemoryRolloverStore::new());
        let clock = Arc::new(TokioClock::starting_at(utc("2026-10-13T15:00:00Z")));
        let service = Arc::new(RolloverService::new(store.clone(), Sao_Paulo));
        let token = CancellationToken::new();

        let scheduler = RolloverScheduler::start_with_token(service, clock, token.clone());
        token.cancel();
        scheduler.join().await.unwrap();

        assert_eq!(store.find_calls().await, 0);
    }
}
