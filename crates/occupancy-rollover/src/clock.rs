//! Wall clock sources for the rollover scheduler.

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Source of the current absolute time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock anchored at a fixed instant that advances with tokio's clock.
///
/// Under `#[tokio::test(start_paused = true)]` it moves only when tokio time
/// is advanced, keeping wall time and timer deadlines in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    anchor: DateTime<Utc>,
    anchored_at: Instant,
}

impl TokioClock {
    /// Create a clock reading `anchor` at the current tokio instant.
    pub fn starting_at(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            anchored_at: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.anchored_at.elapsed()).unwrap_or(TimeDelta::MAX);
        self.anchor
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
