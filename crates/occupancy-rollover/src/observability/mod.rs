//! Observability module for the occupancy rollover.
//!
//! Provides metrics definitions and instrumentation helpers.

pub mod metrics;
