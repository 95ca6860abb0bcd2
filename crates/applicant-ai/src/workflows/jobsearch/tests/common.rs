use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::workflows::jobsearch::domain::{
    JobSnapshot, Response, ResponseClassification, TimeSlot,
};
use crate::workflows::jobsearch::followup::FollowUpPolicy;
use crate::workflows::jobsearch::gateways::{
    CalendarGateway, EventReceipt, EventRequest, ExtractionError, Extractor, GatewayError,
    JobSource, MailGateway, OutboundEmail, OutreachConfig, RawPosting, SearchCriteria, SendReceipt,
};
use crate::workflows::jobsearch::lifecycle::LifecycleController;
use crate::workflows::jobsearch::orchestrator::{Orchestrator, PollConfig};
use crate::workflows::jobsearch::registry::ApplicationRegistry;
use crate::workflows::jobsearch::scheduling::SchedulingConfig;

pub(super) fn dt(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .expect("valid date")
        .and_hms_opt(hour, minute, 0)
        .expect("valid time")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn sample_job() -> JobSnapshot {
    JobSnapshot {
        title: "Backend Engineer".to_string(),
        company: "Initech".to_string(),
        contact_email: "recruiting@initech.example".to_string(),
        location: "Remote".to_string(),
    }
}

pub(super) fn second_job() -> JobSnapshot {
    JobSnapshot {
        title: "Platform Engineer".to_string(),
        company: "Globex".to_string(),
        contact_email: "jobs@globex.example".to_string(),
        location: "New York, NY".to_string(),
    }
}

pub(super) fn outreach_config() -> OutreachConfig {
    OutreachConfig {
        sender_name: "Jordan Doe".to_string(),
        sender_email: "jordan@example.com".to_string(),
        resume_path: "/srv/materials/resume.pdf".to_string(),
        cover_letter_path: None,
    }
}

pub(super) fn scheduling_config() -> SchedulingConfig {
    SchedulingConfig::default()
}

pub(super) fn interview_request(
    reference: &str,
    external: &str,
    received_at: NaiveDateTime,
    proposed_times: Vec<NaiveDateTime>,
) -> Response {
    Response {
        external_id: external.to_string(),
        reference_id: reference.to_string(),
        classification: ResponseClassification::InterviewRequest,
        received_at,
        proposed_times,
    }
}

pub(super) fn classified(
    reference: &str,
    external: &str,
    classification: ResponseClassification,
    received_at: NaiveDateTime,
) -> Response {
    Response {
        external_id: external.to_string(),
        reference_id: reference.to_string(),
        classification,
        received_at,
        proposed_times: Vec::new(),
    }
}

#[derive(Default)]
pub(super) struct ScriptedJobSource {
    pub(super) postings: Mutex<Vec<RawPosting>>,
    pub(super) fail: AtomicBool,
}

impl ScriptedJobSource {
    pub(super) fn with_postings(postings: Vec<RawPosting>) -> Self {
        Self {
            postings: Mutex::new(postings),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl JobSource for ScriptedJobSource {
    async fn search(&self, _criteria: &SearchCriteria) -> Result<Vec<RawPosting>, GatewayError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(GatewayError::Transient("board unavailable".to_string()));
        }
        Ok(self.postings.lock().expect("postings mutex poisoned").clone())
    }
}

/// Extractor double enforcing the required-field and freshness rules.
pub(super) struct FieldExtractor {
    pub(super) today: NaiveDate,
    pub(super) max_age_days: i64,
}

#[async_trait]
impl Extractor for FieldExtractor {
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

#[derive(Default)]
pub(super) struct MemoryMailGateway {
    counter: AtomicU64,
    pub(super) sent: Mutex<Vec<OutboundEmail>>,
    pub(super) inbox: Mutex<Vec<Response>>,
    pub(super) fail_sends: AtomicBool,
    pub(super) fail_fetches: AtomicBool,
}

impl MemoryMailGateway {
    pub(super) fn sent_emails(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("sent mutex poisoned").clone()
    }

    pub(super) fn enqueue(&self, response: Response) {
        self.inbox
            .lock()
            .expect("inbox mutex poisoned")
            .push(response);
    }
}

#[async_trait]
impl MailGateway for MemoryMailGateway {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, GatewayError> {
        if self.fail_sends.load(Ordering::Relaxed) {
            return Err(GatewayError::Transient("smtp unavailable".to_string()));
        }
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
        if self.fail_fetches.load(Ordering::Relaxed) {
            return Err(GatewayError::Timeout { seconds: 30 });
        }
        let mut inbox = self.inbox.lock().expect("inbox mutex poisoned");
        let (matched, rest): (Vec<Response>, Vec<Response>) = inbox
            .drain(..)
            .partition(|response| thread_ids.contains(&response.reference_id));
        *inbox = rest;
        Ok(matched)
    }
}

#[derive(Default)]
pub(super) struct MemoryCalendar {
    counter: AtomicU64,
    pub(super) busy: Mutex<Vec<TimeSlot>>,
    /// When set, only intervals fully inside one of these windows are free.
    pub(super) free_windows: Mutex<Option<Vec<TimeSlot>>>,
    pub(super) events: Mutex<Vec<EventRequest>>,
    pub(super) fail: AtomicBool,
    pub(super) queries: AtomicU64,
}

impl MemoryCalendar {
    pub(super) fn mark_busy(&self, slot: TimeSlot) {
        self.busy.lock().expect("busy mutex poisoned").push(slot);
    }

    pub(super) fn restrict_free_to(&self, windows: Vec<TimeSlot>) {
        *self.free_windows.lock().expect("windows mutex poisoned") = Some(windows);
    }

    pub(super) fn created_events(&self) -> Vec<EventRequest> {
        self.events.lock().expect("events mutex poisoned").clone()
    }

    pub(super) fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CalendarGateway for MemoryCalendar {
    async fn is_free(&self, interval: &TimeSlot, _calendar_id: &str) -> Result<bool, GatewayError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(GatewayError::Transient("calendar unavailable".to_string()));
        }
        self.queries.fetch_add(1, Ordering::Relaxed);
        if let Some(windows) = self
            .free_windows
            .lock()
            .expect("windows mutex poisoned")
            .as_ref()
        {
            return Ok(windows
                .iter()
                .any(|window| window.start <= interval.start && interval.end <= window.end));
        }
        let busy = self.busy.lock().expect("busy mutex poisoned");
        Ok(!busy.iter().any(|held| held.overlaps(interval)))
    }

    async fn create_event(&self, request: &EventRequest) -> Result<EventReceipt, GatewayError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(GatewayError::Transient("calendar unavailable".to_string()));
        }
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

pub(super) type TestController = LifecycleController<MemoryMailGateway, MemoryCalendar>;

pub(super) fn build_controller() -> (Arc<TestController>, Arc<MemoryMailGateway>, Arc<MemoryCalendar>)
{
    let registry = Arc::new(ApplicationRegistry::new(FollowUpPolicy::default().max_follow_ups));
    let mail = Arc::new(MemoryMailGateway::default());
    let calendar = Arc::new(MemoryCalendar::default());
    let controller = Arc::new(LifecycleController::new(
        registry,
        mail.clone(),
        calendar.clone(),
        FollowUpPolicy::default(),
        scheduling_config(),
        outreach_config(),
    ));
    (controller, mail, calendar)
}

pub(super) type TestOrchestrator =
    Orchestrator<ScriptedJobSource, FieldExtractor, MemoryMailGateway, MemoryCalendar>;

pub(super) fn build_orchestrator(
    postings: Vec<RawPosting>,
    today: NaiveDate,
) -> (
    Arc<TestOrchestrator>,
    Arc<TestController>,
    Arc<MemoryMailGateway>,
    Arc<MemoryCalendar>,
) {
    let (controller, mail, calendar) = build_controller();
    let source = Arc::new(ScriptedJobSource::with_postings(postings));
    let extractor = Arc::new(FieldExtractor {
        today,
        max_age_days: 30,
    });
    let orchestrator = Arc::new(Orchestrator::new(
        source,
        extractor,
        mail.clone(),
        controller.clone(),
        SearchCriteria::default(),
        outreach_config(),
        PollConfig::default(),
    ));
    (orchestrator, controller, mail, calendar)
}

pub(super) fn posting(job: &JobSnapshot, posted_on: NaiveDate) -> RawPosting {
    RawPosting {
        source: "linkedin".to_string(),
        title: Some(job.title.clone()),
        company: Some(job.company.clone()),
        contact_email: Some(job.contact_email.clone()),
        location: Some(job.location.clone()),
        description: format!("{} opening at {}", job.title, job.company),
        posted_on: Some(posted_on),
    }
}
