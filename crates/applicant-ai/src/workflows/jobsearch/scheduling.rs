use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::TimeSlot;
use super::gateways::{CalendarGateway, GatewayError};

/// Daily window, inclusive on both bounds, in which interviews may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WorkingHours {
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
            end: NaiveTime::from_hms_opt(17, 0, 0).expect("valid time"),
        }
    }
}

/// Knobs for slot discovery and calendar event creation.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub working_hours: WorkingHours,
    pub buffer_minutes: i64,
    pub default_duration_minutes: i64,
    pub horizon_days: i64,
    /// Wider horizon used by the explicit alternative-time retry.
    pub alternative_horizon_days: i64,
    pub num_slots: usize,
    pub timezone: String,
    pub calendar_id: String,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            working_hours: WorkingHours::default(),
            buffer_minutes: 30,
            default_duration_minutes: 60,
            horizon_days: 7,
            alternative_horizon_days: 5,
            num_slots: 3,
            timezone: "America/New_York".to_string(),
            calendar_id: "primary".to_string(),
        }
    }
}

impl SchedulingConfig {
    pub fn slot_query(&self, proposed_times: Vec<NaiveDateTime>) -> SlotQuery {
        SlotQuery {
            proposed_times,
            duration_minutes: self.default_duration_minutes,
            buffer_minutes: self.buffer_minutes,
            horizon_days: self.horizon_days,
            num_slots: self.num_slots,
        }
    }

    pub fn alternative_query(&self) -> SlotQuery {
        SlotQuery {
            horizon_days: self.alternative_horizon_days,
            ..self.slot_query(Vec::new())
        }
    }
}

/// One slot search: either confirm proposed times or discover open ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotQuery {
    pub proposed_times: Vec<NaiveDateTime>,
    pub duration_minutes: i64,
    pub buffer_minutes: i64,
    pub horizon_days: i64,
    pub num_slots: usize,
}

/// Constraint search over calendar availability, working hours, and buffers.
#[derive(Debug)]
pub struct SlotFinder<C> {
    calendar: Arc<C>,
    hours: WorkingHours,
    calendar_id: String,
}

impl<C> SlotFinder<C>
where
    C: CalendarGateway,
{
    pub fn new(calendar: Arc<C>, hours: WorkingHours, calendar_id: String) -> Self {
        Self {
            calendar,
            hours,
            calendar_id,
        }
    }

    /// Candidate meeting slots for the query.
    ///
    /// An empty result is not an error; it signals no availability and the
    /// caller decides how to surface that.
    pub async fn find(
        &self,
        query: &SlotQuery,
        today: NaiveDate,
    ) -> Result<Vec<TimeSlot>, GatewayError> {
        if query.proposed_times.is_empty() {
            self.scan_horizon(query, today).await
        } else {
            self.confirm_proposed(query).await
        }
    }

    /// Filter the proposer's candidate times without reordering or merging
    /// them; the order is the proposer's preference ranking.
    async fn confirm_proposed(&self, query: &SlotQuery) -> Result<Vec<TimeSlot>, GatewayError> {
        let mut free = Vec::new();
        for start in &query.proposed_times {
            if !self.hours.contains(start.time()) {
                debug!(start = %start, "proposed time outside working hours");
                continue;
            }
            let slot = TimeSlot::from_start(*start, query.duration_minutes);
            if self.is_free(&slot, query.buffer_minutes).await? {
                free.push(slot);
            }
        }
        Ok(free)
    }

    /// Enumerate hour-step candidates across the closed horizon, ascending,
    /// stopping as soon as `num_slots` free candidates are found.
    async fn scan_horizon(
        &self,
        query: &SlotQuery,
        today: NaiveDate,
    ) -> Result<Vec<TimeSlot>, GatewayError> {
        let mut free = Vec::new();
        'days: for offset in 0..=query.horizon_days {
            let day = today + Duration::days(offset);
            let close = day.and_time(self.hours.end);
            let mut cursor = day.and_time(self.hours.start);
            while cursor <= close {
                let slot = TimeSlot::from_start(cursor, query.duration_minutes);
                if self.is_free(&slot, query.buffer_minutes).await? {
                    free.push(slot);
                    if free.len() >= query.num_slots {
                        break 'days;
                    }
                }
                cursor += Duration::hours(1);
            }
        }
        Ok(free)
    }

    async fn is_free(&self, slot: &TimeSlot, buffer_minutes: i64) -> Result<bool, GatewayError> {
        self.calendar
            .is_free(&slot.padded(buffer_minutes), &self.calendar_id)
            .await
    }
}
