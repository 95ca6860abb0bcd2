use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{JobSnapshot, Response, TimeSlot};

/// Search parameters forwarded to the external job boards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    pub job_types: Vec<String>,
    pub experience_levels: Vec<String>,
    pub posted_within_days: i64,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            locations: Vec::new(),
            job_types: vec![
                "full-time".to_string(),
                "contract".to_string(),
                "remote".to_string(),
            ],
            experience_levels: vec![
                "entry".to_string(),
                "mid".to_string(),
                "senior".to_string(),
            ],
            posted_within_days: 30,
        }
    }
}

/// Unvalidated posting as collected from a job board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPosting {
    pub source: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub contact_email: Option<String>,
    pub location: Option<String>,
    pub description: String,
    pub posted_on: Option<NaiveDate>,
}

/// Sender identity and materials attached to outbound applications.
#[derive(Debug, Clone)]
pub struct OutreachConfig {
    pub sender_name: String,
    pub sender_email: String,
    pub resume_path: String,
    pub cover_letter_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<String>,
    /// Message ids this email replies to, for threading.
    pub references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRequest {
    pub summary: String,
    pub description: String,
    pub slot: TimeSlot,
    pub calendar_id: String,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventReceipt {
    pub event_id: String,
}

/// Failure of an external gateway call; retried on the next natural cycle,
/// never in a tight loop.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("transient gateway failure: {0}")]
    Transient(String),
    #[error("gateway call timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// A posting that failed validation; skipped and never tracked.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("posting is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("posting from {posted_on} is outside the {max_age_days} day window")]
    StalePosting {
        posted_on: NaiveDate,
        max_age_days: i64,
    },
}

/// External job-board search.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<RawPosting>, GatewayError>;
}

/// External structured-field extraction and validation over raw postings.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, posting: &RawPosting) -> Result<JobSnapshot, ExtractionError>;
}

/// External email transport.
#[async_trait]
pub trait MailGateway: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, GatewayError>;

    /// New responses referencing any of the given outbound message ids.
    async fn fetch_responses(&self, thread_ids: &[String]) -> Result<Vec<Response>, GatewayError>;
}

/// External calendar; the single source of truth for busy time.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    async fn is_free(&self, interval: &TimeSlot, calendar_id: &str) -> Result<bool, GatewayError>;

    async fn create_event(&self, request: &EventRequest) -> Result<EventReceipt, GatewayError>;
}
