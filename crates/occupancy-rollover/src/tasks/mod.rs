//! Background tasks for the occupancy rollover.
//!
//! # Tasks
//!
//! - `rollover_scheduler` - Fires the daily rollover at each local midnight

pub mod rollover_scheduler;

pub use rollover_scheduler::{RolloverScheduler, SchedulerState};
