//! Occupancy history repository for database operations.
//!
//! Snapshot rows are write-once: this repository inserts and reads them but
//! never updates or deletes.

use crate::errors::RolloverError;
use crate::models::{BedStatus, NewOccupancySnapshot, OccupancySnapshot};
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Repository for occupancy history operations.
pub struct OccupancyHistoryRepository;

impl OccupancyHistoryRepository {
    /// Insert one snapshot row.
    ///
    /// Returns the store-assigned snapshot ID.
    #[instrument(
        skip_all,
        fields(assessment_id = %snapshot.assessment_id, bed_id = %snapshot.bed_id)
    )]
    pub async fn create(
        pool: &PgPool,
        snapshot: &NewOccupancySnapshot,
    ) -> Result<Uuid, RolloverError> {
        let start = Instant::now();

        let query_result: Result<(Uuid,), sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO occupancy_history (
                assessment_id, bed_id, unit_id, hospital_id, bed_number, bed_status,
                scale, total_score, classification, items,
                author_id, author_name, window_start, window_end
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING snapshot_id
            "#,
        )
        .bind(snapshot.assessment_id)
        .bind(snapshot.bed_id)
        .bind(snapshot.unit_id)
        .bind(snapshot.hospital_id)
        .bind(&snapshot.bed_number)
        .bind(snapshot.bed_status.as_db_str())
        .bind(&snapshot.scale)
        .bind(snapshot.total_score)
        .bind(&snapshot.classification)
        .bind(&snapshot.items)
        .bind(snapshot.author_id)
        .bind(&snapshot.author_name)
        .bind(snapshot.window_start)
        .bind(snapshot.window_end)
        .fetch_one(pool)
        .await;

        metrics::record_db_query(
            "create_snapshot",
            metrics::query_status(&query_result),
            start.elapsed(),
        );

        let (snapshot_id,) = query_result?;

        tracing::debug!(
            target: "rollover.repository.occupancy_history",
            snapshot_id = %snapshot_id,
            assessment_id = %snapshot.assessment_id,
            "Occupancy snapshot created"
        );

        Ok(snapshot_id)
    }

    /// List snapshots whose window starts at `window_start`, oldest first.
    #[instrument(skip_all, fields(window_start = %window_start))]
    pub async fn list_by_window_start(
        pool: &PgPool,
        window_start: DateTime<Utc>,
    ) -> Result<Vec<OccupancySnapshot>, RolloverError> {
        let start = Instant::now();

        let query_result: Result<Vec<OccupancySnapshotRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT
                snapshot_id, assessment_id, bed_id, unit_id, hospital_id, bed_number,
                bed_status, scale, total_score, classification, items,
                author_id, author_name, window_start, window_end, created_at
            FROM occupancy_history
            WHERE window_start = $1
            ORDER BY created_at ASC, snapshot_id ASC
            "#,
        )
        .bind(window_start)
        .fetch_all(pool)
        .await;

        metrics::record_db_query(
            "list_snapshots_by_window_start",
            metrics::query_status(&query_result),
            start.elapsed(),
        );

        query_result?
            .into_iter()
            .map(OccupancySnapshot::try_from)
            .collect()
    }

    /// Count snapshots recorded for one assessment.
    #[instrument(skip_all, fields(assessment_id = %assessment_id))]
    pub async fn count_for_assessment(
        pool: &PgPool,
        assessment_id: Uuid,
    ) -> Result<i64, RolloverError> {
        let start = Instant::now();

        let query_result: Result<(i64,), sqlx::Error> =
            sqlx::query_as("SELECT COUNT(*) FROM occupancy_history WHERE assessment_id = $1")
                .bind(assessment_id)
                .fetch_one(pool)
                .await;

        metrics::record_db_query(
            "count_snapshots_for_assessment",
            metrics::query_status(&query_result),
            start.elapsed(),
        );

        let (count,) = query_result?;
        Ok(count)
    }
}

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct OccupancySnapshotRow {
    snapshot_id: Uuid,
    assessment_id: Uuid,
    bed_id: Uuid,
    unit_id: Option<Uuid>,
    hospital_id: Option<Uuid>,
    bed_number: String,
    bed_status: String,
    scale: String,
    total_score: Option<i32>,
    classification: Option<String>,
    items: serde_json::Value,
    author_id: Option<Uuid>,
    author_name: Option<String>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OccupancySnapshotRow> for OccupancySnapshot {
    type Error = RolloverError;

    fn try_from(row: OccupancySnapshotRow) -> Result<Self, Self::Error> {
        let bed_status = BedStatus::from_db_str(&row.bed_status).ok_or_else(|| {
            RolloverError::Database(format!(
                "snapshot {} has unknown bed status '{}'",
                row.snapshot_id, row.bed_status
            ))
        })?;

        Ok(OccupancySnapshot {
            snapshot_id: row.snapshot_id,
            snapshot: NewOccupancySnapshot {
                assessment_id: row.assessment_id,
                bed_id: row.bed_id,
                unit_id: row.unit_id,
                hospital_id: row.hospital_id,
                bed_number: row.bed_number,
                bed_status,
                scale: row.scale,
                total_score: row.total_score,
                classification: row.classification,
                items: row.items,
                author_id: row.author_id,
                author_name: row.author_name,
                window_start: row.window_start,
                window_end: row.window_end,
            },
            created_at: row.created_at,
        })
    }
}
