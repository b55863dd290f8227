//! End-to-end rollover tests against PostgreSQL.
//!
//! Drives `RolloverService` through `PgRolloverStore` on a migrated database.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::America::Sao_Paulo;
use occupancy_rollover::errors::RolloverError;
use occupancy_rollover::models::BedStatus;
use occupancy_rollover::repositories::{BedsRepository, OccupancyHistoryRepository};
use occupancy_rollover::services::{PgRolloverStore, RolloverService};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn service(pool: &PgPool) -> RolloverService {
    RolloverService::new(Arc::new(PgRolloverStore::new(pool.clone())), Sao_Paulo)
}

async fn insert_bed(pool: &PgPool, number: &str, status: &str) -> Result<Uuid, anyhow::Error> {
    let (bed_id,): (Uuid,) =
        sqlx::query_as("INSERT INTO beds (bed_number, status) VALUES ($1, $2) RETURNING bed_id")
            .bind(number)
            .bind(status)
            .fetch_one(pool)
            .await?;
    Ok(bed_id)
}

async fn insert_assessment(
    pool: &PgPool,
    application_date: &str,
    bed_id: Option<Uuid>,
) -> Result<Uuid, anyhow::Error> {
    let application_date = NaiveDate::parse_from_str(application_date, "%Y-%m-%d")?;
    let (assessment_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO assessments (application_date, bed_id, scale, session_status)
        VALUES ($1, $2, 'fugulin', 'released')
        RETURNING assessment_id
        "#,
    )
    .bind(application_date)
    .bind(bed_id)
    .fetch_one(pool)
    .await?;
    Ok(assessment_id)
}

async fn session_statuses(
    pool: &PgPool,
    application_date: &str,
) -> Result<Vec<String>, anyhow::Error> {
    let application_date = NaiveDate::parse_from_str(application_date, "%Y-%m-%d")?;
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT session_status FROM assessments WHERE application_date = $1")
            .bind(application_date)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(s,)| s).collect())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_rollover_one_bed_one_bedless(pool: PgPool) -> Result<(), anyhow::Error> {
    let b1 = insert_bed(&pool, "101", "occupied").await?;
    insert_bed(&pool, "102", "maintenance").await?;
    let with_bed = insert_assessment(&pool, "2026-10-13", Some(b1)).await?;
    insert_assessment(&pool, "2026-10-13", None).await?;
    insert_assessment(&pool, "2026-10-12", Some(b1)).await?;

    let summary = service(&pool).run_manual("2026-10-13").await?;

    assert_eq!(summary.assessments_found, 2);
    assert_eq!(summary.snapshots_created, 1);
    assert_eq!(summary.assessments_without_bed, 1);
    assert_eq!(summary.beds_reset, 2);
    assert_eq!(summary.sessions_expired, 2);

    let snapshots =
        OccupancyHistoryRepository::list_by_window_start(&pool, utc("2026-10-13T03:00:00Z"))
            .await?;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].snapshot.assessment_id, with_bed);
    assert_eq!(snapshots[0].snapshot.bed_status, BedStatus::Occupied);
    assert_eq!(
        snapshots[0].snapshot.window_end,
        utc("2026-10-14T02:59:59.999Z")
    );

    let beds = BedsRepository::list_beds(&pool).await?;
    assert!(beds.iter().all(|b| b.status == BedStatus::Pending));

    assert_eq!(session_statuses(&pool, "2026-10-13").await?, vec!["expired", "expired"]);
    assert_eq!(session_statuses(&pool, "2026-10-12").await?, vec!["released"]);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_rollover_twice_duplicates_history(pool: PgPool) -> Result<(), anyhow::Error> {
    let b1 = insert_bed(&pool, "101", "occupied").await?;
    let assessment_id = insert_assessment(&pool, "2026-10-13", Some(b1)).await?;
    let service = service(&pool);

    service.run_manual("2026-10-13").await?;
    service.run_manual("2026-10-13").await?;

    assert_eq!(
        OccupancyHistoryRepository::count_for_assessment(&pool, assessment_id).await?,
        2
    );

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_rollover_rejects_malformed_date(pool: PgPool) -> Result<(), anyhow::Error> {
    let b1 = insert_bed(&pool, "101", "occupied").await?;

    let result = service(&pool).run_manual("2026-13-01").await;

    assert!(matches!(result, Err(RolloverError::InvalidDate(_))));
    assert_eq!(
        BedsRepository::get_bed(&pool, b1).await?.map(|b| b.status),
        Some(BedStatus::Occupied)
    );

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_rollover_fails_when_schema_missing(pool: PgPool) -> Result<(), anyhow::Error> {
    let b1 = insert_bed(&pool, "101", "occupied").await?;
    insert_assessment(&pool, "2026-10-13", Some(b1)).await?;
    sqlx::query("DROP TABLE occupancy_history").execute(&pool).await?;

    let result = service(&pool).run_manual("2026-10-13").await;

    assert!(matches!(result, Err(RolloverError::Database(_))));
    assert_eq!(
        BedsRepository::get_bed(&pool, b1).await?.map(|b| b.status),
        Some(BedStatus::Occupied)
    );

    Ok(())
}
