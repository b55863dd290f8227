//! Daily rollover service.
//!
//! Archives one calendar day's assessments into occupancy history, resets
//! every bed to pending and expires that day's assessment sessions.
//!
//! The manual and scheduled entry points share one routine and differ only
//! in their [`ErrorPolicy`]: a manual run hands failures back to its caller,
//! a scheduled run logs them and lets the scheduler carry on.

use crate::calendar;
use crate::errors::RolloverError;
use crate::models::{Assessment, DayWindow, NewOccupancySnapshot, RolloverSummary};
use crate::observability::metrics;
use crate::services::rollover_store::RolloverStore;
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// What to do with a failed rollover after it has been logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Return the error to the caller.
    Propagate,
    /// Swallow the error.
    LogAndContinue,
}

impl ErrorPolicy {
    /// Trigger label used in logs and metrics.
    pub fn trigger(&self) -> &'static str {
        match self {
            ErrorPolicy::Propagate => "manual",
            ErrorPolicy::LogAndContinue => "scheduled",
        }
    }
}

/// Daily rollover over a shared store in a fixed reference time zone.
pub struct RolloverService {
    store: Arc<dyn RolloverStore>,
    time_zone: Tz,
}

impl RolloverService {
    pub fn new(store: Arc<dyn RolloverStore>, time_zone: Tz) -> Self {
        Self { store, time_zone }
    }

    /// Reference time zone for day boundaries.
    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    /// Roll over `target_date` (`yyyy-mm-dd`) on demand.
    ///
    /// # Errors
    ///
    /// - `RolloverError::InvalidDate` - `target_date` is not `yyyy-mm-dd`; no store call is made
    /// - `RolloverError::Database` - any read or write failed
    /// - `RolloverError::Calendar` - the day window could not be computed
    #[instrument(skip_all, name = "rollover.manual", fields(target_date = %target_date))]
    pub async fn run_manual(&self, target_date: &str) -> Result<RolloverSummary, RolloverError> {
        let date = calendar::parse_target_date(target_date).map_err(|e| {
            warn!(
                target: "rollover.service",
                target_date = %target_date,
                error = %e,
                "Rejected manual rollover"
            );
            e
        })?;

        self.run_with_policy(date, ErrorPolicy::Propagate).await
    }

    /// Roll over `target_date` from the scheduler.
    ///
    /// Never fails: errors are logged and `None` is returned.
    #[instrument(skip_all, name = "rollover.scheduled", fields(target_date = %target_date))]
    pub async fn run_scheduled(&self, target_date: NaiveDate) -> Option<RolloverSummary> {
        self.run_with_policy(target_date, ErrorPolicy::LogAndContinue)
            .await
            .ok()
    }

    /// Run one rollover and apply `policy` to a failure.
    ///
    /// With `ErrorPolicy::LogAndContinue` the failure is logged here and the
    /// returned error is only informational.
    pub async fn run_with_policy(
        &self,
        target_date: NaiveDate,
        policy: ErrorPolicy,
    ) -> Result<RolloverSummary, RolloverError> {
        let start = Instant::now();
        let result = self.execute(target_date).await;

        match &result {
            Ok(summary) => {
                metrics::record_rollover(policy.trigger(), "success", start.elapsed());
                info!(
                    target: "rollover.service",
                    trigger = policy.trigger(),
                    target_date = %target_date,
                    assessments_found = summary.assessments_found,
                    snapshots_created = summary.snapshots_created,
                    assessments_without_bed = summary.assessments_without_bed,
                    beds_reset = summary.beds_reset,
                    sessions_expired = summary.sessions_expired,
                    "Rollover completed"
                );
            }
            Err(e) => {
                metrics::record_rollover(policy.trigger(), e.error_type(), start.elapsed());
                let outcome = match policy {
                    ErrorPolicy::Propagate => "propagated",
                    ErrorPolicy::LogAndContinue => "continuing",
                };
                warn!(
                    target: "rollover.service",
                    trigger = policy.trigger(),
                    target_date = %target_date,
                    error = %e,
                    outcome = outcome,
                    "Rollover failed"
                );
            }
        }

        result
    }

    async fn execute(&self, target_date: NaiveDate) -> Result<RolloverSummary, RolloverError> {
        let window = calendar::day_window(target_date, self.time_zone)?;

        let assessments = self.store.find_assessments_by_date(target_date).await?;

        let mut snapshots_created = 0;
        for assessment in &assessments {
            let Some(snapshot) = build_snapshot(assessment, &window) else {
                debug!(
                    target: "rollover.service",
                    assessment_id = %assessment.assessment_id,
                    "Assessment has no bed, skipping snapshot"
                );
                continue;
            };

            self.store.create_snapshot(&snapshot).await?;
            metrics::record_snapshots_created(1);
            snapshots_created += 1;
        }

        // Maintenance beds were meant to keep their status here; the reset has
        // always covered every bed. Pending product clarification.
        let beds_reset = self.store.reset_all_beds_to_pending().await?;

        let sessions_expired = self.store.expire_sessions_for_date(target_date).await?;

        Ok(RolloverSummary {
            target_date,
            window,
            assessments_found: assessments.len(),
            snapshots_created,
            assessments_without_bed: assessments.len() - snapshots_created,
            beds_reset,
            sessions_expired,
        })
    }
}

/// Build the history snapshot for one assessment.
///
/// Returns `None` when the assessment has no bed.
pub fn build_snapshot(assessment: &Assessment, window: &DayWindow) -> Option<NewOccupancySnapshot> {
    let bed = assessment.bed.as_ref()?;
    let unit = assessment.unit.as_ref();

    Some(NewOccupancySnapshot {
        assessment_id: assessment.assessment_id,
        bed_id: bed.bed_id,
        unit_id: unit.map(|u| u.unit_id),
        hospital_id: unit
            .and_then(|u| u.hospital.as_ref())
            .map(|h| h.hospital_id),
        bed_number: bed.bed_number.clone(),
        bed_status: bed.status,
        scale: assessment.scale.clone(),
        total_score: assessment.total_score,
        classification: assessment.classification.clone(),
        items: assessment.items.clone(),
        author_id: assessment.author.as_ref().map(|a| a.author_id),
        author_name: assessment.author.as_ref().map(|a| a.name.clone()),
        window_start: window.start,
        window_end: window.end,
    })
}
