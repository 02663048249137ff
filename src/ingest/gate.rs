use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Returns true if a new upstream call may be made at `now`.
/// - Never fetched before: always allowed.
/// - Otherwise at least `min_interval` must have passed since the last attempt.
pub fn allowed(
    now: DateTime<Utc>,
    last_fetch_at: Option<DateTime<Utc>>,
    min_interval: ChronoDuration,
) -> bool {
    match last_fetch_at {
        None => true,
        Some(last) => now.signed_duration_since(last) >= min_interval,
    }
}

/// Minimum-interval guard. Holds no timestamp itself; callers keep the
/// last-attempt time wherever it needs to survive (config file, loop state).
#[derive(Debug, Clone, Copy)]
pub struct RateGate {
    min_interval: ChronoDuration,
}

impl RateGate {
    /// `min_interval_secs` < 0 is treated as 0 (no gating).
    pub fn new(min_interval_secs: i64) -> Self {
        Self {
            min_interval: ChronoDuration::seconds(min_interval_secs.max(0)),
        }
    }

    pub fn allowed(&self, now: DateTime<Utc>, last_fetch_at: Option<DateTime<Utc>>) -> bool {
        allowed(now, last_fetch_at, self.min_interval)
    }

    pub fn min_interval(&self) -> ChronoDuration {
        self.min_interval
    }
}
