use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, warn};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Interview, InterviewStatus, JobSnapshot,
    Response, ResponseClassification, TimeSlot,
};
use super::followup::FollowUpPolicy;
use super::gateways::{
    CalendarGateway, EventRequest, GatewayError, MailGateway, OutboundEmail, OutreachConfig,
    SendReceipt,
};
use super::registry::{ApplicationRegistry, RegistryError};
use super::scheduling::{SchedulingConfig, SlotFinder};

/// How the controller disposed of an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseDisposition {
    Rejected,
    Scheduled(TimeSlot),
    /// No free slot satisfied the request; the application stays in
    /// `ResponseReceived` pending an alternative-time retry.
    NoAvailability,
    Acknowledged,
    OfferRecorded,
    /// Already applied once; redelivery is a no-op.
    Duplicate,
    /// References an id the registry does not track; logged and dropped.
    UnknownReference,
    /// Target state not reachable from the current one; logged and dropped.
    OutOfOrder,
    Ignored,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FollowUpSweep {
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("application {0} has no pending scheduling conflict")]
    NoPendingConflict(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum EventKind {
    Submission,
    FollowUp,
    Response(ResponseClassification),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EventKey {
    application: ApplicationId,
    kind: EventKind,
    external_id: String,
}

/// Ledger of applied events, keyed on `(application, kind, external id)`, so
/// redelivered events are no-ops. Entries only exist for events that were
/// fully applied; a transient failure mid-event leaves the event unrecorded
/// and a redelivery retries it.
#[derive(Debug)]
struct EventLedger {
    retention: Duration,
    seen: Mutex<HashMap<EventKey, NaiveDateTime>>,
}

impl EventLedger {
    fn new(retention: Duration) -> Self {
        Self {
            retention,
            seen: Mutex::new(HashMap::new()),
        }
    }

    fn contains(&self, key: &EventKey) -> bool {
        self.seen
            .lock()
            .expect("event ledger mutex poisoned")
            .contains_key(key)
    }

    fn record(&self, key: EventKey, now: NaiveDateTime) {
        self.seen
            .lock()
            .expect("event ledger mutex poisoned")
            .insert(key, now);
    }

    fn prune(&self, now: NaiveDateTime) {
        self.seen
            .lock()
            .expect("event ledger mutex poisoned")
            .retain(|_, recorded_at| now - *recorded_at < self.retention);
    }
}

/// State machine driving each application through its lifecycle.
///
/// Consumes send results, classified responses, and scheduling results, and
/// mutates registry entries exclusively through atomic transitions.
pub struct LifecycleController<M, C> {
    registry: Arc<ApplicationRegistry>,
    mail: Arc<M>,
    calendar: Arc<C>,
    slots: SlotFinder<C>,
    policy: FollowUpPolicy,
    scheduling: SchedulingConfig,
    outreach: OutreachConfig,
    ledger: EventLedger,
}

impl<M, C> LifecycleController<M, C>
where
    M: MailGateway,
    C: CalendarGateway,
{
    pub fn new(
        registry: Arc<ApplicationRegistry>,
        mail: Arc<M>,
        calendar: Arc<C>,
        policy: FollowUpPolicy,
        scheduling: SchedulingConfig,
        outreach: OutreachConfig,
    ) -> Self {
        let slots = SlotFinder::new(
            calendar.clone(),
            scheduling.working_hours,
            scheduling.calendar_id.clone(),
        );
        let ledger = EventLedger::new(policy.retry_horizon());
        Self {
            registry,
            mail,
            calendar,
            slots,
            policy,
            scheduling,
            outreach,
            ledger,
        }
    }

    pub fn registry(&self) -> &Arc<ApplicationRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &FollowUpPolicy {
        &self.policy
    }

    /// Track a successfully sent application: `Identified` then `Applied`.
    pub fn record_submission(
        &self,
        job: JobSnapshot,
        receipt: SendReceipt,
        now: NaiveDateTime,
    ) -> Result<Application, LifecycleError> {
        let id = ApplicationId(receipt.message_id.clone());
        let app = Application::identified(id.clone(), job, receipt.message_id.clone(), now);
        self.registry.upsert(app);
        let committed = self.registry.transition(&id, now, |app| {
            app.status = ApplicationStatus::Applied;
            Ok(())
        })?;
        self.ledger.record(
            EventKey {
                application: id.clone(),
                kind: EventKind::Submission,
                external_id: receipt.message_id,
            },
            now,
        );
        info!(
            application = %id.0,
            company = %committed.job.company,
            title = %committed.job.title,
            "application sent"
        );
        Ok(committed)
    }

    /// Apply one classified response to its application.
    pub async fn handle_response(
        &self,
        response: &Response,
        now: NaiveDateTime,
    ) -> Result<ResponseDisposition, LifecycleError> {
        let Some(app) = self.registry.find_by_reference(&response.reference_id) else {
            warn!(
                reference = %response.reference_id,
                classification = response.classification.label(),
                "response references an untracked application; dropping"
            );
            return Ok(ResponseDisposition::UnknownReference);
        };

        let key = EventKey {
            application: app.id.clone(),
            kind: EventKind::Response(response.classification),
            external_id: response.external_id.clone(),
        };
        if self.ledger.contains(&key) {
            debug!(application = %app.id.0, "duplicate response delivery ignored");
            return Ok(ResponseDisposition::Duplicate);
        }

        let disposition = match response.classification {
            ResponseClassification::Rejection => self.apply_rejection(&app, now)?,
            ResponseClassification::InterviewRequest => {
                self.schedule_interview(&app, response, now).await?
            }
            ResponseClassification::PositiveAcknowledgement => {
                self.acknowledge(&app, response, now).await?
            }
            ResponseClassification::Offer => self.record_offer(&app, now)?,
            ResponseClassification::Other => {
                debug!(application = %app.id.0, "unclassifiable response left unhandled");
                ResponseDisposition::Ignored
            }
        };

        if !matches!(
            disposition,
            ResponseDisposition::OutOfOrder | ResponseDisposition::Ignored
        ) {
            self.ledger.record(key, now);
        }
        Ok(disposition)
    }

    fn apply_rejection(
        &self,
        app: &Application,
        now: NaiveDateTime,
    ) -> Result<ResponseDisposition, LifecycleError> {
        let result = self.registry.transition(&app.id, now, |app| {
            app.status = ApplicationStatus::Rejected;
            app.awaiting_alternatives = false;
            if let Some(interview) = app.interview.as_mut() {
                interview.status = InterviewStatus::Cancelled;
            }
            Ok(())
        });
        match result {
            Ok(committed) => {
                info!(
                    application = %app.id.0,
                    company = %committed.job.company,
                    "application rejected"
                );
                Ok(ResponseDisposition::Rejected)
            }
            Err(RegistryError::InvalidTransition { from, to }) => {
                warn!(
                    application = %app.id.0,
                    from = from.label(),
                    to = to.label(),
                    "out-of-order rejection dropped"
                );
                Ok(ResponseDisposition::OutOfOrder)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn schedule_interview(
        &self,
        app: &Application,
        response: &Response,
        now: NaiveDateTime,
    ) -> Result<ResponseDisposition, LifecycleError> {
        match self.registry.transition(&app.id, now, |app| {
            app.status = ApplicationStatus::ResponseReceived;
            Ok(())
        }) {
            Ok(_) => {}
            Err(RegistryError::InvalidTransition { from, to }) => {
                warn!(
                    application = %app.id.0,
                    from = from.label(),
                    to = to.label(),
                    "out-of-order interview request dropped"
                );
                return Ok(ResponseDisposition::OutOfOrder);
            }
            Err(err) => return Err(err.into()),
        }

        let query = self.scheduling.slot_query(response.proposed_times.clone());
        let candidates = self.slots.find(&query, now.date()).await?;
        let Some(slot) = candidates.first().copied() else {
            self.registry.transition(&app.id, now, |app| {
                app.awaiting_alternatives = true;
                Ok(())
            })?;
            info!(
                application = %app.id.0,
                company = %app.job.company,
                "no interview slot available; awaiting alternative times"
            );
            return Ok(ResponseDisposition::NoAvailability);
        };

        let receipt = self
            .calendar
            .create_event(&self.interview_event(app, slot))
            .await?;

        let committed = self.registry.transition(&app.id, now, |app| {
            app.status = ApplicationStatus::InterviewScheduled;
            app.awaiting_alternatives = false;
            app.interview = Some(Interview {
                event_id: receipt.event_id.clone(),
                scheduled_for: slot.start,
                status: InterviewStatus::Confirmed,
            });
            Ok(())
        })?;

        let confirmation = OutboundEmail {
            to: app.job.contact_email.clone(),
            subject: format!(
                "Interview confirmation - {} position at {}",
                app.job.title, app.job.company
            ),
            body: format!(
                "Confirming the interview on {} for the {} position.\n\n{}",
                slot.start, app.job.title, self.outreach.sender_name
            ),
            attachments: Vec::new(),
            references: vec![response.external_id.clone()],
        };
        if let Err(err) = self.mail.send(&confirmation).await {
            warn!(
                application = %app.id.0,
                error = %err,
                "interview confirmation email failed; the event stands"
            );
        }

        info!(
            application = %committed.id.0,
            company = %committed.job.company,
            scheduled_for = %slot.start,
            "interview scheduled"
        );
        Ok(ResponseDisposition::Scheduled(slot))
    }

    async fn acknowledge(
        &self,
        app: &Application,
        response: &Response,
        now: NaiveDateTime,
    ) -> Result<ResponseDisposition, LifecycleError> {
        match self.registry.transition(&app.id, now, |app| {
            app.status = ApplicationStatus::ResponseReceived;
            Ok(())
        }) {
            Ok(_) => {}
            Err(RegistryError::InvalidTransition { from, to }) => {
                warn!(
                    application = %app.id.0,
                    from = from.label(),
                    to = to.label(),
                    "out-of-order acknowledgement dropped"
                );
                return Ok(ResponseDisposition::OutOfOrder);
            }
            Err(err) => return Err(err.into()),
        }

        let thank_you = OutboundEmail {
            to: app.job.contact_email.clone(),
            subject: format!(
                "Re: {} position at {}",
                app.job.title, app.job.company
            ),
            body: format!(
                "Thank you for the update on the {} position.\n\n{}",
                app.job.title, self.outreach.sender_name
            ),
            attachments: Vec::new(),
            references: vec![response.external_id.clone()],
        };
        if let Err(err) = self.mail.send(&thank_you).await {
            warn!(application = %app.id.0, error = %err, "thank-you email failed");
        }

        Ok(ResponseDisposition::Acknowledged)
    }

    fn record_offer(
        &self,
        app: &Application,
        now: NaiveDateTime,
    ) -> Result<ResponseDisposition, LifecycleError> {
        match self.registry.transition(&app.id, now, |app| {
            app.status = ApplicationStatus::OfferReceived;
            Ok(())
        }) {
            Ok(committed) => {
                info!(
                    application = %committed.id.0,
                    company = %committed.job.company,
                    "offer received"
                );
                Ok(ResponseDisposition::OfferRecorded)
            }
            Err(RegistryError::InvalidTransition { from, to }) => {
                warn!(
                    application = %app.id.0,
                    from = from.label(),
                    to = to.label(),
                    "out-of-order offer dropped"
                );
                Ok(ResponseDisposition::OutOfOrder)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// One pass of the follow-up policy over every waiting application.
    ///
    /// A failed send leaves the application untouched for the next sweep.
    pub async fn sweep_follow_ups(&self, now: NaiveDateTime) -> FollowUpSweep {
        let mut sweep = FollowUpSweep::default();
        let due: Vec<Application> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|app| self.policy.is_due(app, now))
            .collect();

        for app in due {
            let email = OutboundEmail {
                to: app.job.contact_email.clone(),
                subject: format!(
                    "Following up on {} application - {}",
                    app.job.title, app.job.company
                ),
                body: format!(
                    "Checking in on my application for the {} position.\n\n{}",
                    app.job.title, self.outreach.sender_name
                ),
                attachments: Vec::new(),
                references: vec![app.outbound_message_id.clone()],
            };
            match self.mail.send(&email).await {
                Ok(receipt) => {
                    let result = self.registry.transition(&app.id, now, |app| {
                        app.status = ApplicationStatus::FollowUpSent;
                        app.follow_ups_sent += 1;
                        app.thread_message_ids.push(receipt.message_id.clone());
                        Ok(())
                    });
                    match result {
                        Ok(committed) => {
                            sweep.sent += 1;
                            self.ledger.record(
                                EventKey {
                                    application: app.id.clone(),
                                    kind: EventKind::FollowUp,
                                    external_id: receipt.message_id,
                                },
                                now,
                            );
                            info!(
                                application = %committed.id.0,
                                company = %committed.job.company,
                                count = committed.follow_ups_sent,
                                "follow-up sent"
                            );
                        }
                        Err(err) => {
                            sweep.failed += 1;
                            warn!(application = %app.id.0, error = %err, "follow-up not recorded");
                        }
                    }
                }
                Err(err) => {
                    sweep.failed += 1;
                    warn!(
                        application = %app.id.0,
                        error = %err,
                        "follow-up send failed; retrying next sweep"
                    );
                }
            }
        }
        sweep
    }

    /// Move interviews whose end has passed with no further signal to
    /// `InterviewCompleted`.
    pub fn complete_elapsed_interviews(&self, now: NaiveDateTime) -> usize {
        let mut completed = 0;
        for app in self
            .registry
            .list_by_status(ApplicationStatus::InterviewScheduled)
        {
            let elapsed = app.interview.as_ref().is_some_and(|interview| {
                interview.scheduled_for + Duration::minutes(self.scheduling.default_duration_minutes)
                    <= now
            });
            if !elapsed {
                continue;
            }
            match self.registry.transition(&app.id, now, |app| {
                app.status = ApplicationStatus::InterviewCompleted;
                Ok(())
            }) {
                Ok(committed) => {
                    completed += 1;
                    info!(
                        application = %committed.id.0,
                        company = %committed.job.company,
                        "interview completed"
                    );
                }
                Err(err) => {
                    warn!(application = %app.id.0, error = %err, "interview completion skipped");
                }
            }
        }
        completed
    }

    /// Explicit accept/decline of a received offer.
    pub fn resolve_offer(
        &self,
        id: &ApplicationId,
        accept: bool,
        now: NaiveDateTime,
    ) -> Result<Application, LifecycleError> {
        let target = if accept {
            ApplicationStatus::Accepted
        } else {
            ApplicationStatus::Withdrawn
        };
        let committed = self.registry.transition(id, now, |app| {
            app.status = target;
            Ok(())
        })?;
        info!(application = %id.0, outcome = target.label(), "offer resolved");
        Ok(committed)
    }

    /// Distinct alternative-time retry for an application stuck on a
    /// scheduling conflict: search a wider horizon and email the candidate
    /// slots to the contact.
    pub async fn propose_alternatives(
        &self,
        id: &ApplicationId,
        now: NaiveDateTime,
    ) -> Result<Vec<TimeSlot>, LifecycleError> {
        let app = self.registry.get(id)?;
        if app.status != ApplicationStatus::ResponseReceived || !app.awaiting_alternatives {
            return Err(LifecycleError::NoPendingConflict(id.0.clone()));
        }

        let query = self.scheduling.alternative_query();
        let slots = self.slots.find(&query, now.date()).await?;
        if slots.is_empty() {
            info!(application = %id.0, "no alternative slots inside the wider horizon");
            return Ok(slots);
        }

        let listing = slots
            .iter()
            .map(|slot| format!("- {}", slot.start))
            .collect::<Vec<_>>()
            .join("\n");
        let email = OutboundEmail {
            to: app.job.contact_email.clone(),
            subject: format!(
                "Alternative interview times - {} position at {}",
                app.job.title, app.job.company
            ),
            body: format!(
                "The proposed time does not work; any of these would:\n{}\n\n{}",
                listing, self.outreach.sender_name
            ),
            attachments: Vec::new(),
            references: vec![app.outbound_message_id.clone()],
        };
        self.mail.send(&email).await?;
        info!(
            application = %id.0,
            offered = slots.len(),
            "alternative interview times offered"
        );
        Ok(slots)
    }

    /// Event record for the interview calendar entry.
    fn interview_event(&self, app: &Application, slot: TimeSlot) -> EventRequest {
        EventRequest {
            summary: format!("Interview with {} - {}", app.job.company, app.job.title),
            description: format!(
                "Job interview\nCompany: {}\nPosition: {}\nLocation: {}",
                app.job.company, app.job.title, app.job.location
            ),
            slot,
            calendar_id: self.scheduling.calendar_id.clone(),
            timezone: self.scheduling.timezone.clone(),
        }
    }

    /// Drop applied-event records older than the retry horizon.
    pub fn prune_event_ledger(&self, now: NaiveDateTime) {
        self.ledger.prune(now);
    }
}
