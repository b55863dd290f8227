//! Repository layer for the occupancy rollover.
//!
//! Provides database access for the three collections the rollover touches.
//! Queries are built at runtime so no database is needed at compile time.

pub mod assessments;
pub mod beds;
pub mod occupancy_history;

pub use assessments::AssessmentsRepository;
pub use beds::BedsRepository;
pub use occupancy_history::OccupancyHistoryRepository;
