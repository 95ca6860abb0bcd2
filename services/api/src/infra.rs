use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use applicant_ai::workflows::jobsearch::{
    CalendarGateway, EventReceipt, EventRequest, ExtractionError, Extractor, GatewayError,
    JobSnapshot, JobSource, MailGateway, OutboundEmail, RawPosting, Response, SearchCriteria,
    SendReceipt, TimeSlot,
};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Built-in job board: real board connectors live outside this service and
/// are swapped in behind the same trait.
pub(crate) struct SeededJobSource {
    postings: Vec<RawPosting>,
}

impl SeededJobSource {
    pub(crate) fn new(postings: Vec<RawPosting>) -> Self {
        Self { postings }
    }
}

#[async_trait]
impl JobSource for SeededJobSource {
    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<RawPosting>, GatewayError> {
        let keywords: Vec<String> = criteria
            .keywords
            .iter()
            .map(|keyword| keyword.to_ascii_lowercase())
            .collect();
        let matched = self
            .postings
            .iter()
            .filter(|posting| {
                keywords.is_empty()
                    || keywords
                        .iter()
                        .any(|keyword| posting.description.to_ascii_lowercase().contains(keyword))
            })
            .cloned()
            .collect();
        Ok(matched)
    }
}

/// Field-presence and freshness validation over raw postings.
pub(crate) struct RequiredFieldExtractor {
    pub(crate) today: NaiveDate,
    pub(crate) max_age_days: i64,
}

#[async_trait]
impl Extractor for RequiredFieldExtractor {
    async fn extract(&self, posting: &RawPosting) -> Result<JobSnapshot, ExtractionError> {
        let title = posting
            .title
            .clone()
            .ok_or(ExtractionError::MissingField("title"))?;
        let company = posting
            .company
            .clone()
            .ok_or(ExtractionError::MissingField("company"))?;
        let contact_email = posting
            .contact_email
            .clone()
            .ok_or(ExtractionError::MissingField("contact_email"))?;
        let location = posting
            .location
            .clone()
            .ok_or(ExtractionError::MissingField("location"))?;
        if let Some(posted_on) = posting.posted_on {
            if (self.today - posted_on).num_days() > self.max_age_days {
                return Err(ExtractionError::StalePosting {
                    posted_on,
                    max_age_days: self.max_age_days,
                });
            }
        }
        Ok(JobSnapshot {
            title,
            company,
            contact_email,
            location,
        })
    }
}

/// In-memory mail transport with a scriptable inbox.
#[derive(Default)]
pub(crate) struct InMemoryMailGateway {
    counter: AtomicU64,
    sent: Mutex<Vec<OutboundEmail>>,
    inbox: Mutex<Vec<Response>>,
}

impl InMemoryMailGateway {
    pub(crate) fn enqueue_response(&self, response: Response) {
        self.inbox
            .lock()
            .expect("inbox mutex poisoned")
            .push(response);
    }

    pub(crate) fn sent_emails(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("sent mutex poisoned").clone()
    }
}

#[async_trait]
impl MailGateway for InMemoryMailGateway {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, GatewayError> {
        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.sent
            .lock()
            .expect("sent mutex poisoned")
            .push(email.clone());
        Ok(SendReceipt {
            message_id: format!("msg-{id:04}"),
        })
    }

    async fn fetch_responses(&self, thread_ids: &[String]) -> Result<Vec<Response>, GatewayError> {
        let mut inbox = self.inbox.lock().expect("inbox mutex poisoned");
        let (matched, rest): (Vec<Response>, Vec<Response>) = inbox
            .drain(..)
            .partition(|response| thread_ids.contains(&response.reference_id));
        *inbox = rest;
        Ok(matched)
    }
}

/// In-memory calendar with explicit busy windows.
#[derive(Default)]
pub(crate) struct InMemoryCalendarGateway {
    counter: AtomicU64,
    busy: Mutex<Vec<TimeSlot>>,
    events: Mutex<Vec<EventRequest>>,
}

impl InMemoryCalendarGateway {
    pub(crate) fn mark_busy(&self, slot: TimeSlot) {
        self.busy.lock().expect("busy mutex poisoned").push(slot);
    }

    pub(crate) fn created_events(&self) -> Vec<EventRequest> {
        self.events.lock().expect("events mutex poisoned").clone()
    }
}

#[async_trait]
impl CalendarGateway for InMemoryCalendarGateway {
    async fn is_free(&self, interval: &TimeSlot, _calendar_id: &str) -> Result<bool, GatewayError> {
        let busy = self.busy.lock().expect("busy mutex poisoned");
        let held_events = self.events.lock().expect("events mutex poisoned");
        let conflict = busy.iter().any(|held| held.overlaps(interval))
            || held_events.iter().any(|event| event.slot.overlaps(interval));
        Ok(!conflict)
    }

    async fn create_event(&self, request: &EventRequest) -> Result<EventReceipt, GatewayError> {
        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.events
            .lock()
            .expect("events mutex poisoned")
            .push(request.clone());
        Ok(EventReceipt {
            event_id: format!("evt-{id:04}"),
        })
    }
}

/// Sample postings seeding the built-in board.
pub(crate) fn seeded_postings(today: NaiveDate) -> Vec<RawPosting> {
    vec![
        RawPosting {
            source: "linkedin".to_string(),
            title: Some("Senior Backend Engineer".to_string()),
            company: Some("Initech".to_string()),
            contact_email: Some("recruiting@initech.example".to_string()),
            location: Some("Remote".to_string()),
            description: "Senior backend engineer working on billing infrastructure".to_string(),
            posted_on: Some(today - Duration::days(3)),
        },
        RawPosting {
            source: "indeed".to_string(),
            title: Some("Platform Engineer".to_string()),
            company: Some("Globex".to_string()),
            contact_email: Some("jobs@globex.example".to_string()),
            location: Some("New York, NY".to_string()),
            description: "Platform engineer for the developer experience team".to_string(),
            posted_on: Some(today - Duration::days(10)),
        },
        RawPosting {
            source: "glassdoor".to_string(),
            title: Some("Staff Software Engineer".to_string()),
            company: Some("Umbrella Labs".to_string()),
            contact_email: Some("talent@umbrella.example".to_string()),
            location: Some("San Francisco, CA".to_string()),
            description: "Staff software engineer on distributed storage".to_string(),
            posted_on: Some(today - Duration::days(1)),
        },
        // Missing contact details; validation drops it before tracking.
        RawPosting {
            source: "company_site".to_string(),
            title: Some("Principal Engineer".to_string()),
            company: Some("Hooli".to_string()),
            contact_email: None,
            location: Some("Palo Alto, CA".to_string()),
            description: "Principal engineer, compression team".to_string(),
            posted_on: Some(today - Duration::days(2)),
        },
    ]
}
