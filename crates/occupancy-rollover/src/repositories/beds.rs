//! Beds repository for database operations.
//!
//! # Security
//!
//! - All queries use parameterized statements (SQL injection safe)

use crate::errors::RolloverError;
use crate::models::{Bed, BedStatus};
use crate::observability::metrics;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Repository for bed operations.
pub struct BedsRepository;

impl BedsRepository {
    /// Set every bed in the store to `pending`.
    ///
    /// The update has no predicate: beds in maintenance, cleaning or blocked
    /// states are reset along with the rest.
    ///
    /// Returns the number of rows updated.
    #[instrument(skip_all)]
    pub async fn reset_all_to_pending(pool: &PgPool) -> Result<u64, RolloverError> {
        let start = Instant::now();

        let query_result = sqlx::query(
            r#"
            UPDATE beds
            SET status = $1,
                updated_at = NOW()
            "#,
        )
        .bind(BedStatus::Pending.as_db_str())
        .execute(pool)
        .await;

        metrics::record_db_query(
            "reset_all_beds_to_pending",
            metrics::query_status(&query_result),
            start.elapsed(),
        );

        let count = query_result?.rows_affected();

        tracing::info!(
            target: "rollover.repository.beds",
            count = count,
            "Reset beds to pending"
        );

        Ok(count)
    }

    /// Get a bed by ID.
    #[instrument(skip_all, fields(bed_id = %bed_id))]
    pub async fn get_bed(pool: &PgPool, bed_id: Uuid) -> Result<Option<Bed>, RolloverError> {
        let start = Instant::now();

        let query_result: Result<Option<BedRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT bed_id, bed_number, status
            FROM beds
            WHERE bed_id = $1
            "#,
        )
        .bind(bed_id)
        .fetch_optional(pool)
        .await;

        metrics::record_db_query(
            "get_bed",
            metrics::query_status(&query_result),
            start.elapsed(),
        );

        query_result?.map(Bed::try_from).transpose()
    }

    /// List all beds ordered by bed number.
    #[instrument(skip_all)]
    pub async fn list_beds(pool: &PgPool) -> Result<Vec<Bed>, RolloverError> {
        let start = Instant::now();

        let query_result: Result<Vec<BedRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT bed_id, bed_number, status
            FROM beds
            ORDER BY bed_number ASC
            "#,
        )
        .fetch_all(pool)
        .await;

        metrics::record_db_query(
            "list_beds",
            metrics::query_status(&query_result),
            start.elapsed(),
        );

        query_result?.into_iter().map(Bed::try_from).collect()
    }
}

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct BedRow {
    bed_id: Uuid,
    bed_number: String,
    status: String,
}

impl TryFrom<BedRow> for Bed {
    type Error = RolloverError;

    fn try_from(row: BedRow) -> Result<Self, Self::Error> {
        let status = BedStatus::from_db_str(&row.status).ok_or_else(|| {
            RolloverError::Database(format!(
                "bed {} has unknown status '{}'",
                row.bed_id, row.status
            ))
        })?;

        Ok(Bed {
            bed_id: row.bed_id,
            bed_number: row.bed_number,
            status,
        })
    }
}
