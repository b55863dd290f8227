//! Service layer for the occupancy rollover.
//!
//! # Components
//!
//! - `rollover` - The daily archive-and-reset routine
//! - `rollover_store` - Data access boundary with PostgreSQL and in-memory implementations

pub mod rollover;
pub mod rollover_store;

pub use rollover::{build_snapshot, ErrorPolicy, RolloverService};
pub use rollover_store::{PgRolloverStore, RolloverStore};
