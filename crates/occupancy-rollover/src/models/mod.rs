//! Occupancy rollover models.
//!
//! Contains the entities read and written by the daily rollover. Their
//! schemas are owned by the hosting application's data store; these types
//! carry only the fields the rollover touches.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Bed status enumeration.
///
/// Stored as lowercase text in the `beds.status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BedStatus {
    /// Bed is free.
    Vacant,

    /// Bed awaits the day's first assessment.
    Pending,

    /// Bed holds a patient.
    Occupied,

    /// Bed is held for an incoming patient.
    Reserved,

    /// Bed is being cleaned.
    Cleaning,

    /// Bed is under repair.
    Maintenance,

    /// Bed is out of service.
    Blocked,
}

impl BedStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            BedStatus::Vacant => "vacant",
            BedStatus::Pending => "pending",
            BedStatus::Occupied => "occupied",
            BedStatus::Reserved => "reserved",
            BedStatus::Cleaning => "cleaning",
            BedStatus::Maintenance => "maintenance",
            BedStatus::Blocked => "blocked",
        }
    }

    /// Parse from database string representation.
    ///
    /// Returns `None` for values this crate does not know.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "vacant" => Some(BedStatus::Vacant),
            "pending" => Some(BedStatus::Pending),
            "occupied" => Some(BedStatus::Occupied),
            "reserved" => Some(BedStatus::Reserved),
            "cleaning" => Some(BedStatus::Cleaning),
            "maintenance" => Some(BedStatus::Maintenance),
            "blocked" => Some(BedStatus::Blocked),
            _ => None,
        }
    }
}

/// Assessment session status.
///
/// Lifecycle flag indicating whether an assessment is still an active
/// care-scoring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Scoring has started but is not yet released.
    InProgress,

    /// Scoring is complete and visible.
    Released,

    /// The assessment's day has been rolled over.
    Expired,
}

impl SessionStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Released => "released",
            SessionStatus::Expired => "expired",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(SessionStatus::InProgress),
            "released" => Some(SessionStatus::Released),
            "expired" => Some(SessionStatus::Expired),
            _ => None,
        }
    }
}

/// Bed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bed {
    pub bed_id: Uuid,
    pub bed_number: String,
    pub status: BedStatus,
}

/// Hospital resolved through an assessment's unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HospitalRef {
    pub hospital_id: Uuid,
    pub name: String,
}

/// Unit resolved from an assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRef {
    pub unit_id: Uuid,
    pub name: String,
    /// Owning hospital, if the unit references one.
    pub hospital: Option<HospitalRef>,
}

/// Author resolved from an assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRef {
    pub author_id: Uuid,
    pub name: String,
}

/// Assessment with its associations eagerly resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// Unique assessment identifier.
    pub assessment_id: Uuid,

    /// Calendar date the assessment was applied on.
    pub application_date: NaiveDate,

    /// Assessed bed, with its status at read time.
    pub bed: Option<Bed>,

    /// Care unit the assessment belongs to.
    pub unit: Option<UnitRef>,

    /// Staff member who scored the assessment.
    pub author: Option<AuthorRef>,

    /// Scoring scale identifier.
    pub scale: String,

    /// Total score, absent while scoring is incomplete.
    pub total_score: Option<i32>,

    /// Care classification derived from the score.
    pub classification: Option<String>,

    /// Per-item score breakdown.
    pub items: serde_json::Value,

    /// Session lifecycle status.
    pub session_status: SessionStatus,
}

/// Absolute time window covering one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayWindow {
    /// First instant of the local day.
    pub start: DateTime<Utc>,

    /// Last millisecond of the local day.
    pub end: DateTime<Utc>,
}

/// Occupancy history snapshot to be inserted.
///
/// Denormalized, point-in-time copy of one assessment and its bed context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOccupancySnapshot {
    pub assessment_id: Uuid,
    pub bed_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub hospital_id: Option<Uuid>,
    pub bed_number: String,
    pub bed_status: BedStatus,
    pub scale: String,
    pub total_score: Option<i32>,
    pub classification: Option<String>,
    pub items: serde_json::Value,
    pub author_id: Option<Uuid>,
    pub author_name: Option<String>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Occupancy history snapshot as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupancySnapshot {
    /// Store-assigned identifier.
    pub snapshot_id: Uuid,

    /// Snapshot content.
    #[serde(flatten)]
    pub snapshot: NewOccupancySnapshot,

    /// When the row was written.
    pub created_at: DateTime<Utc>,
}

/// Outcome of one rollover run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloverSummary {
    /// Calendar date that was rolled over.
    pub target_date: NaiveDate,

    /// Window written into every snapshot of this run.
    pub window: DayWindow,

    /// Assessments found for the target date.
    pub assessments_found: usize,

    /// Snapshots written.
    pub snapshots_created: usize,

    /// Assessments skipped for having no bed.
    pub assessments_without_bed: usize,

    /// Bed rows reset to pending.
    pub beds_reset: u64,

    /// Assessment rows marked expired.
    pub sessions_expired: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const ALL_BED_STATUSES: [BedStatus; 7] = [
        BedStatus::Vacant,
        BedStatus::Pending,
        BedStatus::Occupied,
        BedStatus::Reserved,
        BedStatus::Cleaning,
        BedStatus::Maintenance,
        BedStatus::Blocked,
    ];

    #[test]
    fn test_bed_status_db_strings() {
        assert_eq!(BedStatus::Pending.as_db_str(), "pending");
        assert_eq!(BedStatus::Occupied.as_db_str(), "occupied");
        assert_eq!(BedStatus::Maintenance.as_db_str(), "maintenance");

        for status in ALL_BED_STATUSES {
            assert_eq!(BedStatus::from_db_str(status.as_db_str()), Some(status));
        }
    }

    #[test]
    fn test_bed_status_unknown_value() {
        assert_eq!(BedStatus::from_db_str("PENDING"), None);
        assert_eq!(BedStatus::from_db_str("demolished"), None);
    }

    #[test]
    fn test_session_status_db_strings() {
        assert_eq!(SessionStatus::InProgress.as_db_str(), "in_progress");
        assert_eq!(
            SessionStatus::from_db_str("released"),
            Some(SessionStatus::Released)
        );
        assert_eq!(
            SessionStatus::from_db_str("expired"),
            Some(SessionStatus::Expired)
        );
        assert_eq!(SessionStatus::from_db_str("archived"), None);
    }

    #[test]
    fn test_bed_status_serde_matches_db_strings() {
        for status in ALL_BED_STATUSES {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_db_str()));
        }

        let json = serde_json::to_string(&SessionStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
