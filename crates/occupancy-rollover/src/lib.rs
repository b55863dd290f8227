//! Occupancy Rollover Library
//!
//! Daily housekeeping for hospital bed occupancy. At each local midnight the
//! previous day's assessments are archived into occupancy history, every bed
//! is reset to pending and that day's assessment sessions expire.
//!
//! # Architecture
//!
//! ```text
//! tasks/rollover_scheduler.rs -> services/rollover.rs
//!     -> services/rollover_store.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `calendar` - Local-day windows and midnight arithmetic in a named time zone
//! - `clock` - Wall clock sources
//! - `config` - Configuration from environment
//! - `errors` - Error types
//! - `models` - Data models
//! - `observability` - Metrics recording
//! - `repositories` - PostgreSQL access
//! - `services` - Rollover routine and its store boundary
//! - `tasks` - Midnight scheduler

pub mod calendar;
pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod services;
pub mod tasks;
