use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for tracked applications, derived from the outbound message id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Immutable snapshot of the posting an application was sent for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub title: String,
    pub company: String,
    pub contact_email: String,
    pub location: String,
}

/// Lifecycle status of an application.
///
/// Statuses advance along a directed graph and never regress; `Rejected` is
/// reachable from every non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Identified,
    Applied,
    FollowUpSent,
    ResponseReceived,
    InterviewScheduled,
    InterviewCompleted,
    OfferReceived,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Identified => "identified",
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::FollowUpSent => "follow_up_sent",
            ApplicationStatus::ResponseReceived => "response_received",
            ApplicationStatus::InterviewScheduled => "interview_scheduled",
            ApplicationStatus::InterviewCompleted => "interview_completed",
            ApplicationStatus::OfferReceived => "offer_received",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }

    /// Statuses in which the applicant is waiting on the company to reply;
    /// follow-ups apply here and inbound responses correlate here.
    pub const fn awaiting_reply(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Applied | ApplicationStatus::FollowUpSent
        )
    }

    /// Whether `next` is a legal single step from this status.
    pub fn can_advance_to(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;

        if self.is_terminal() {
            return false;
        }
        if next == Rejected {
            return true;
        }

        matches!(
            (self, next),
            (Identified, Applied)
                | (Applied, FollowUpSent)
                | (Applied, ResponseReceived)
                | (FollowUpSent, FollowUpSent)
                | (FollowUpSent, ResponseReceived)
                | (ResponseReceived, ResponseReceived)
                | (ResponseReceived, InterviewScheduled)
                | (InterviewScheduled, InterviewCompleted)
                | (InterviewCompleted, OfferReceived)
                | (OfferReceived, Accepted)
                | (OfferReceived, Withdrawn)
        )
    }
}

/// One job-posting-to-applicant tracking record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub job: JobSnapshot,
    pub status: ApplicationStatus,
    pub created_at: NaiveDateTime,
    pub last_transition_at: NaiveDateTime,
    pub outbound_message_id: String,
    /// The initial outbound message id plus every follow-up message id;
    /// inbound responses correlate on any of these.
    pub thread_message_ids: Vec<String>,
    pub follow_ups_sent: u8,
    pub interview: Option<Interview>,
    /// Set when an interview request could not be scheduled and the
    /// application is waiting on an alternative-time retry.
    pub awaiting_alternatives: bool,
}

impl Application {
    /// A freshly identified application, not yet confirmed as sent.
    pub fn identified(
        id: ApplicationId,
        job: JobSnapshot,
        outbound_message_id: String,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            job,
            status: ApplicationStatus::Identified,
            created_at: now,
            last_transition_at: now,
            thread_message_ids: vec![outbound_message_id.clone()],
            outbound_message_id,
            follow_ups_sent: 0,
            interview: None,
            awaiting_alternatives: false,
        }
    }

    pub fn references(&self, message_id: &str) -> bool {
        self.thread_message_ids.iter().any(|id| id == message_id)
    }
}

/// Inbound classified signal correlated to a prior outbound message.
///
/// Classification is produced by an external classifier; the core treats it as
/// opaque input and never re-infers it. `proposed_times` carries any
/// already-extracted candidate interview times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Message id of the response itself.
    pub external_id: String,
    /// Message id of the outbound message this responds to.
    pub reference_id: String,
    pub classification: ResponseClassification,
    pub received_at: NaiveDateTime,
    #[serde(default)]
    pub proposed_times: Vec<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseClassification {
    Rejection,
    InterviewRequest,
    PositiveAcknowledgement,
    Offer,
    Other,
}

impl ResponseClassification {
    pub const fn label(self) -> &'static str {
        match self {
            ResponseClassification::Rejection => "rejection",
            ResponseClassification::InterviewRequest => "interview_request",
            ResponseClassification::PositiveAcknowledgement => "positive_acknowledgement",
            ResponseClassification::Offer => "offer",
            ResponseClassification::Other => "other",
        }
    }
}

/// A scheduled interview, owned by exactly one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interview {
    pub event_id: String,
    pub scheduled_for: NaiveDateTime,
    pub status: InterviewStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Proposed,
    Confirmed,
    Cancelled,
}

impl InterviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InterviewStatus::Proposed => "proposed",
            InterviewStatus::Confirmed => "confirmed",
            InterviewStatus::Cancelled => "cancelled",
        }
    }
}

/// Half-open `[start, end)` interval in the pipeline's fixed timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeSlot {
    pub fn from_start(start: NaiveDateTime, duration_minutes: i64) -> Self {
        Self {
            start,
            end: start + Duration::minutes(duration_minutes),
        }
    }

    /// The interval widened by the buffer on both sides.
    pub fn padded(&self, buffer_minutes: i64) -> Self {
        Self {
            start: self.start - Duration::minutes(buffer_minutes),
            end: self.end + Duration::minutes(buffer_minutes),
        }
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }
}
