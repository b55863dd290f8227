//! Assessments repository for database operations.
//!
//! Reads assessments with their bed, unit, hospital and author resolved in a
//! single query, and expires the sessions of a rolled-over date.
//!
//! # Security
//!
//! - All queries use parameterized statements (SQL injection safe)
//! - Patient-facing fields (scores, items) are not logged

use crate::errors::RolloverError;
use crate::models::{Assessment, AuthorRef, Bed, BedStatus, HospitalRef, SessionStatus, UnitRef};
use crate::observability::metrics;
use chrono::NaiveDate;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Repository for assessment operations.
pub struct AssessmentsRepository;

impl AssessmentsRepository {
    /// Fetch every assessment applied on `application_date`.
    ///
    /// Bed, unit, the unit's hospital and author are joined eagerly; missing
    /// associations come back as `None`. Matching is exact on the date column.
    ///
    /// # Errors
    ///
    /// Returns `RolloverError::Database` on query failure or when a stored
    /// status is not a known value.
    #[instrument(skip_all, fields(application_date = %application_date))]
    pub async fn find_by_application_date(
        pool: &PgPool,
        application_date: NaiveDate,
    ) -> Result<Vec<Assessment>, RolloverError> {
        let start = Instant::now();

        let query_result: Result<Vec<AssessmentRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT
                a.assessment_id,
                a.application_date,
                a.scale,
                a.total_score,
                a.classification,
                a.items,
                a.session_status,
                b.bed_id,
                b.bed_number,
                b.status AS bed_status,
                u.unit_id,
                u.name AS unit_name,
                h.hospital_id,
                h.name AS hospital_name,
                au.author_id,
                au.name AS author_name
            FROM assessments a
            LEFT JOIN beds b ON a.bed_id = b.bed_id
            LEFT JOIN units u ON a.unit_id = u.unit_id
            LEFT JOIN hospitals h ON u.hospital_id = h.hospital_id
            LEFT JOIN authors au ON a.author_id = au.author_id
            WHERE a.application_date = $1
            ORDER BY a.created_at ASC, a.assessment_id ASC
            "#,
        )
        .bind(application_date)
        .fetch_all(pool)
        .await;

        metrics::record_db_query(
            "find_assessments_by_date",
            metrics::query_status(&query_result),
            start.elapsed(),
        );

        query_result?
            .into_iter()
            .map(Assessment::try_from)
            .collect()
    }

    /// Mark every assessment applied on `application_date` as expired.
    ///
    /// Returns the number of rows updated.
    #[instrument(skip_all, fields(application_date = %application_date))]
    pub async fn expire_sessions_for_date(
        pool: &PgPool,
        application_date: NaiveDate,
    ) -> Result<u64, RolloverError> {
        let start = Instant::now();

        let query_result = sqlx::query(
            r#"
            UPDATE assessments
            SET session_status = $2,
                updated_at = NOW()
            WHERE application_date = $1
            "#,
        )
        .bind(application_date)
        .bind(SessionStatus::Expired.as_db_str())
        .execute(pool)
        .await;

        metrics::record_db_query(
            "expire_sessions_for_date",
            metrics::query_status(&query_result),
            start.elapsed(),
        );

        let count = query_result?.rows_affected();

        tracing::info!(
            target: "rollover.repository.assessments",
            application_date = %application_date,
            count = count,
            "Expired assessment sessions"
        );

        Ok(count)
    }
}

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct AssessmentRow {
    assessment_id: Uuid,
    application_date: NaiveDate,
    scale: String,
    total_score: Option<i32>,
    classification: Option<String>,
    items: serde_json::Value,
    session_status: String,
    bed_id: Option<Uuid>,
    bed_number: Option<String>,
    bed_status: Option<String>,
    unit_id: Option<Uuid>,
    unit_name: Option<String>,
    hospital_id: Option<Uuid>,
    hospital_name: Option<String>,
    author_id: Option<Uuid>,
    author_name: Option<String>,
}

impl TryFrom<AssessmentRow> for Assessment {
    type Error = RolloverError;

    fn try_from(row: AssessmentRow) -> Result<Self, Self::Error> {
        let session_status = SessionStatus::from_db_str(&row.session_status).ok_or_else(|| {
            RolloverError::Database(format!(
                "assessment {} has unknown session status '{}'",
                row.assessment_id, row.session_status
            ))
        })?;

        let bed = match (row.bed_id, row.bed_number, row.bed_status) {
            (Some(bed_id), Some(bed_number), Some(status)) => Some(Bed {
                bed_id,
                bed_number,
                status: BedStatus::from_db_str(&status).ok_or_else(|| {
                    RolloverError::Database(format!(
                        "bed {} has unknown status '{}'",
                        bed_id, status
                    ))
                })?,
            }),
            _ => None,
        };

        let hospital = match (row.hospital_id, row.hospital_name) {
            (Some(hospital_id), Some(name)) => Some(HospitalRef { hospital_id, name }),
            _ => None,
        };

        let unit = match (row.unit_id, row.unit_name) {
            (Some(unit_id), Some(name)) => Some(UnitRef {
                unit_id,
                name,
                hospital,
            }),
            _ => None,
        };

        let author = match (row.author_id, row.author_name) {
            (Some(author_id), Some(name)) => Some(AuthorRef { author_id, name }),
            _ => None,
        };

        Ok(Assessment {
            assessment_id: row.assessment_id,
            application_date: row.application_date,
            bed,
            unit,
            author,
            scale: row.scale,
            total_score: row.total_score,
            classification: row.classification,
            items: row.items,
            session_status,
        })
    }
}
