use chrono::{Duration, NaiveDateTime};

use super::domain::Application;

/// Cadence rules for nudging companies that have not replied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUpPolicy {
    pub interval_days: i64,
    pub max_follow_ups: u8,
}

impl Default for FollowUpPolicy {
    fn default() -> Self {
        Self {
            interval_days: 5,
            max_follow_ups: 2,
        }
    }
}

impl FollowUpPolicy {
    /// Pure decision: a follow-up is due iff the application is still waiting
    /// on a reply, the counter is under the cap, and the interval has elapsed
    /// since the last transition.
    pub fn is_due(&self, app: &Application, now: NaiveDateTime) -> bool {
        app.status.awaiting_reply()
            && app.follow_ups_sent < self.max_follow_ups
            && now - app.last_transition_at >= Duration::days(self.interval_days)
    }

    /// How long applied event records must be retained so redelivered events
    /// stay deduplicated across every possible follow-up retry.
    pub fn retry_horizon(&self) -> Duration {
        Duration::days(self.interval_days * (i64::from(self.max_follow_ups) + 1))
    }
}
