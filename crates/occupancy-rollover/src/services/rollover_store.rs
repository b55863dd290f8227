//! Data access boundary for the daily rollover.
//!
//! `RolloverStore` names the four operations the rollover needs. The
//! PostgreSQL implementation delegates to the repositories; the `mock` module
//! keeps everything in memory for tests.

use crate::errors::RolloverError;
use crate::models::{Assessment, NewOccupancySnapshot};
use crate::repositories::{AssessmentsRepository, BedsRepository, OccupancyHistoryRepository};
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

/// Trait for rollover data operations (enables mocking).
#[async_trait::async_trait]
pub trait RolloverStore: Send + Sync {
    /// Fetch assessments applied on `date` with associations resolved.
    async fn find_assessments_by_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Assessment>, RolloverError>;

    /// Persist a single occupancy snapshot.
    async fn create_snapshot(&self, snapshot: &NewOccupancySnapshot)
        -> Result<Uuid, RolloverError>;

    /// Set every bed to pending, unconditionally.
    async fn reset_all_beds_to_pending(&self) -> Result<u64, RolloverError>;

    /// Mark every assessment applied on `date` as expired.
    async fn expire_sessions_for_date(&self, date: NaiveDate) -> Result<u64, RolloverError>;
}

/// PostgreSQL-backed store.
///
/// The pool is owned by the caller; cloning it here only shares the handle.
#[derive(Clone)]
pub struct PgRolloverStore {
    pool: PgPool,
}

impl PgRolloverStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RolloverStore for PgRolloverStore {
    async fn find_assessments_by_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Assessment>, RolloverError> {
        AssessmentsRepository::find_by_application_date(&self.pool, date).await
    }

    async fn create_snapshot(
        &self,
        snapshot: &NewOccupancySnapshot,
    ) -> Result<Uuid, RolloverError> {
        OccupancyHistoryRepository::create(&self.pool, snapshot).await
    }

    async fn reset_all_beds_to_pending(&self) -> Result<u64, RolloverError> {
        BedsRepository::reset_all_to_pending(&self.pool).await
    }

    async fn expire_sessions_for_date(&self, date: NaiveDate) -> Result<u64, RolloverError> {
        AssessmentsRepository::expire_sessions_for_date(&self.pool, date).await
    }
}

/// In-memory store module for testing.
///
/// Mirrors the PostgreSQL store's semantics: assessments resolve their bed
/// from the live bed list at read time, and the bed reset touches every bed.
pub mod mock {
    use super::*;
    use crate::models::{AuthorRef, Bed, BedStatus, OccupancySnapshot, SessionStatus, UnitRef};
    use chrono::Utc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Operation that the mock store fails on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FailPoint {
        /// Fail the assessment fetch.
        FindAssessments,
        /// Fail the snapshot insert once `after` snapshots exist in the store.
        CreateSnapshot { after: usize },
        /// Fail the bed reset.
        ResetBeds,
        /// Fail the session expiry.
        ExpireSessions,
    }

    /// Assessment as stored, with the bed held by reference.
    #[derive(Debug, Clone, PartialEq)]
    pub struct AssessmentRecord {
        pub assessment_id: Uuid,
        pub application_date: NaiveDate,
        pub bed_id: Option<Uuid>,
        pub unit: Option<UnitRef>,
        pub author: Option<AuthorRef>,
        pub scale: String,
        pub total_score: Option<i32>,
        pub classification: Option<String>,
        pub items: serde_json::Value,
        pub session_status: SessionStatus,
    }

    impl AssessmentRecord {
        /// Create an in-progress assessment with no associations.
        pub fn new(application_date: NaiveDate, scale: &str) -> Self {
            Self {
                assessment_id: Uuid::new_v4(),
                application_date,
                bed_id: None,
                unit: None,
                author: None,
                scale: scale.to_string(),
                total_score: None,
                classification: None,
                items: serde_json::json!([]),
                session_status: SessionStatus::InProgress,
            }
        }

        pub fn with_bed(mut self, bed_id: Uuid) -> Self {
            self.bed_id = Some(bed_id);
            self
        }

        pub fn with_unit(mut self, unit: UnitRef) -> Self {
            self.unit = Some(unit);
            self
        }

        pub fn with_author(mut self, author: AuthorRef) -> Self {
            self.author = Some(author);
            self
        }

        pub fn with_score(mut self, total_score: i32, classification: &str) -> Self {
            self.total_score = Some(total_score);
            self.classification = Some(classification.to_string());
            self
        }

        pub fn with_session_status(mut self, session_status: SessionStatus) -> Self {
            self.session_status = session_status;
            self
        }
    }

    #[derive(Default)]
    struct MemoryState {
        beds: Vec<Bed>,
        assessments: Vec<AssessmentRecord>,
        snapshots: Vec<OccupancySnapshot>,
        fail_point: Option<FailPoint>,
        find_calls: usize,
    }

    /// In-memory rollover store for unit testing.
    #[derive(Default)]
    pub struct InMemoryRolloverStore {
        state: Mutex<MemoryState>,
        latency: Duration,
    }

    impl InMemoryRolloverStore {
        /// Create an empty store.
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a bed.
        pub fn with_bed(mut self, bed: Bed) -> Self {
            self.state.get_mut().beds.push(bed);
            self
        }

        /// Add an assessment.
        pub fn with_assessment(mut self, record: AssessmentRecord) -> Self {
            self.state.get_mut().assessments.push(record);
            self
        }

        /// Fail starting with the given operation.
        pub fn with_fail_point(mut self, fail_point: FailPoint) -> Self {
            self.state.get_mut().fail_point = Some(fail_point);
            self
        }

        /// Delay every operation by `latency` of tokio time.
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        /// Replace or clear the fail point.
        pub async fn set_fail_point(&self, fail_point: Option<FailPoint>) {
            self.state.lock().await.fail_point = fail_point;
        }

        /// Current beds.
        pub async fn beds(&self) -> Vec<Bed> {
            self.state.lock().await.beds.clone()
        }

        /// Current bed by ID.
        pub async fn bed(&self, bed_id: Uuid) -> Option<Bed> {
            self.state
                .lock()
                .await
                .beds
                .iter()
                .find(|b| b.bed_id == bed_id)
                .cloned()
        }

        /// Current assessments.
        pub async fn assessments(&self) -> Vec<AssessmentRecord> {
            self.state.lock().await.assessments.clone()
        }

        /// Snapshots written so far, in insertion order.
        pub async fn snapshots(&self) -> Vec<OccupancySnapshot> {
            self.state.lock().await.snapshots.clone()
        }

        /// Number of assessment fetches performed.
        pub async fn find_calls(&self) -> usize {
            self.state.lock().await.find_calls
        }

        async fn simulate_latency(&self) {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
        }
    }

    fn injected(operation: &str) -> RolloverError {
        RolloverError::Database(format!("injected failure in {}", operation))
    }

    #[async_trait::async_trait]
    impl RolloverStore for InMemoryRolloverStore {
        async fn find_assessments_by_date(
            &self,
            date: NaiveDate,
        ) -> Result<Vec<Assessment>, RolloverError> {
            self.simulate_latency().await;
            let mut state = self.state.lock().await;
            state.find_calls += 1;

            if state.fail_point == Some(FailPoint::FindAssessments) {
                return Err(injected("find_assessments_by_date"));
            }

            Ok(state
                .assessments
                .iter()
                .filter(|a| a.application_date == date)
                .map(|a| Assessment {
                    assessment_id: a.assessment_id,
                    application_date: a.application_date,
                    bed: a
                        .bed_id
                        .and_then(|id| state.beds.iter().find(|b| b.bed_id == id).cloned()),
                    unit: a.unit.clone(),
                    author: a.author.clone(),
                    scale: a.scale.clone(),
                    total_score: a.total_score,
                    classification: a.classification.clone(),
                    items: a.items.clone(),
                    session_status: a.session_status,
                })
                .collect())
        }

        async fn create_snapshot(
            &self,
            snapshot: &NewOccupancySnapshot,
        ) -> Result<Uuid, RolloverError> {
            self.simulate_latency().await;
            let mut state = self.state.lock().await;

            if let Some(FailPoint::CreateSnapshot { after }) = state.fail_point {
                if state.snapshots.len() >= after {
                    return Err(injected("create_snapshot"));
                }
            }

            let snapshot_id = Uuid::new_v4();
            state.snapshots.push(OccupancySnapshot {
                snapshot_id,
                snapshot: snapshot.clone(),
                created_at: Utc::now(),
            });
            Ok(snapshot_id)
        }

        async fn reset_all_beds_to_pending(&self) -> Result<u64, RolloverError> {
            self.simulate_latency().await;
            let mut state = self.state.lock().await;

            if state.fail_point == Some(FailPoint::ResetBeds) {
                return Err(injected("reset_all_beds_to_pending"));
            }

            for bed in state.beds.iter_mut() {
                bed.status = BedStatus::Pending;
            }
            Ok(state.beds.len() as u64)
        }

        async fn expire_sessions_for_date(&self, date: NaiveDate) -> Result<u64, RolloverError> {
            self.simulate_latency().await;
            let mut state = self.state.lock().await;

            if state.fail_point == Some(FailPoint::ExpireSessions) {
                return Err(injected("expire_sessions_for_date"));
            }

            let mut count = 0;
            for assessment in state
                .assessments
                .iter_mut()
                .filter(|a| a.application_date == date)
            {
                assessment.session_status = SessionStatus::Expired;
                count += 1;
            }
            Ok(count)
        }
    }

}
