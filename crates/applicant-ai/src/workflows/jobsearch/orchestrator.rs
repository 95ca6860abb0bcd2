use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::gateways::{
    CalendarGateway, Extractor, JobSource, MailGateway, OutboundEmail, OutreachConfig,
    SearchCriteria,
};
use super::lifecycle::{LifecycleController, LifecycleError};

/// Driver cadence and fan-out limits for the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval_seconds: u64,
    pub max_concurrent_sends: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 3600,
            max_concurrent_sends: 4,
        }
    }
}

/// Counts from the one-shot search-and-apply pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchSummary {
    pub jobs_found: usize,
    pub jobs_processed: usize,
    pub applications_sent: usize,
}

/// Counts from one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    pub new_responses: usize,
    pub active_applications: usize,
    pub completed_applications: usize,
    pub follow_ups_sent: usize,
    pub interviews_completed: usize,
}

/// Periodic driver: one search-and-apply pass, then an indefinite poll loop
/// feeding responses to the lifecycle controller and running the follow-up
/// sweep.
pub struct Orchestrator<J, E, M, C> {
    source: Arc<J>,
    extractor: Arc<E>,
    mail: Arc<M>,
    controller: Arc<LifecycleController<M, C>>,
    criteria: SearchCriteria,
    outreach: OutreachConfig,
    poll: PollConfig,
}

impl<J, E, M, C> Orchestrator<J, E, M, C>
where
    J: JobSource + 'static,
    E: Extractor + 'static,
    M: MailGateway + 'static,
    C: CalendarGateway + 'static,
{
    pub fn new(
        source: Arc<J>,
        extractor: Arc<E>,
        mail: Arc<M>,
        controller: Arc<LifecycleController<M, C>>,
        criteria: SearchCriteria,
        outreach: OutreachConfig,
        poll: PollConfig,
    ) -> Self {
        Self {
            source,
            extractor,
            mail,
            controller,
            criteria,
            outreach,
            poll,
        }
    }

    pub fn controller(&self) -> &Arc<LifecycleController<M, C>> {
        &self.controller
    }

    /// Collect postings, validate them, and send initial applications with
    /// bounded parallelism. A search failure yields an empty pass rather than
    /// aborting startup.
    pub async fn run_search_pass(&self, now: NaiveDateTime) -> SearchSummary {
        let postings = match self.source.search(&self.criteria).await {
            Ok(postings) => postings,
            Err(err) => {
                warn!(error = %err, "job search failed; continuing with an empty pass");
                return SearchSummary::default();
            }
        };

        let mut summary = SearchSummary {
            jobs_found: postings.len(),
            ..SearchSummary::default()
        };

        let mut jobs = Vec::new();
        for posting in &postings {
            match self.extractor.extract(posting).await {
                Ok(job) => jobs.push(job),
                Err(err) => {
                    warn!(source = %posting.source, error = %err, "skipping invalid posting");
                }
            }
        }
        summary.jobs_processed = jobs.len();

        let semaphore = Arc::new(Semaphore::new(self.poll.max_concurrent_sends));
        let mut sends: JoinSet<bool> = JoinSet::new();
        for job in jobs {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let email = self.application_email(&job);
            let mail = self.mail.clone();
            let controller = self.controller.clone();
            sends.spawn(async move {
                let _permit = permit;
                let receipt = match mail.send(&email).await {
                    Ok(receipt) => receipt,
                    Err(err) => {
                        warn!(
                            company = %job.company,
                            title = %job.title,
                            error = %err,
                            "application send failed"
                        );
                        return false;
                    }
                };
                match controller.record_submission(job, receipt, now) {
                    Ok(_) => true,
                    Err(err) => {
                        warn!(error = %err, "sent application could not be tracked");
                        false
                    }
                }
            });
        }
        while let Some(joined) = sends.join_next().await {
            if matches!(joined, Ok(true)) {
                summary.applications_sent += 1;
            }
        }
        summary
    }

    /// One poll cycle: complete elapsed interviews, pull new responses, feed
    /// them to the controller in delivery order, then run the follow-up sweep.
    pub async fn poll_cycle(&self, now: NaiveDateTime) -> Result<PollSummary, LifecycleError> {
        let interviews_completed = self.controller.complete_elapsed_interviews(now);

        let thread_ids = self.controller.registry().open_thread_ids();
        let responses = self.mail.fetch_responses(&thread_ids).await?;
        for response in &responses {
            if let Err(err) = self.controller.handle_response(response, now).await {
                warn!(
                    reference = %response.reference_id,
                    error = %err,
                    "response handling failed; application left unchanged"
                );
            }
        }

        let sweep = self.controller.sweep_follow_ups(now).await;
        self.controller.prune_event_ledger(now);

        let registry = self.controller.registry();
        Ok(PollSummary {
            new_responses: responses.len(),
            active_applications: registry.active_count(),
            completed_applications: registry.completed_count(),
            follow_ups_sent: sweep.sent,
            interviews_completed,
        })
    }

    /// Run the pipeline: search-and-apply once, then poll until shutdown.
    ///
    /// A failed cycle is logged and the loop proceeds to the next tick; two
    /// cycles never overlap.
    pub async fn run(&self, mut shutdown: mpsc::Receiver<()>) {
        let now = Local::now().naive_local();
        let summary = self.run_search_pass(now).await;
        info!(
            jobs_found = summary.jobs_found,
            jobs_processed = summary.jobs_processed,
            applications_sent = summary.applications_sent,
            "search-and-apply pass complete"
        );

        let mut ticker = tokio::time::interval(Duration::from_secs(self.poll.interval_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Local::now().naive_local();
                    match self.poll_cycle(now).await {
                        Ok(status) => info!(
                            new_responses = status.new_responses,
                            active = status.active_applications,
                            completed = status.completed_applications,
                            follow_ups = status.follow_ups_sent,
                            "poll cycle complete"
                        ),
                        Err(err) => warn!(error = %err, "poll cycle failed; retrying next interval"),
                    }
                }
                _ = shutdown.recv() => {
                    info!("shutdown signal received; stopping poll loop");
                    break;
                }
            }
        }
    }

    fn application_email(&self, job: &super::domain::JobSnapshot) -> OutboundEmail {
        let mut attachments = vec![self.outreach.resume_path.clone()];
        if let Some(cover_letter) = &self.outreach.cover_letter_path {
            attachments.push(cover_letter.clone());
        }
        OutboundEmail {
            to: job.contact_email.clone(),
            subject: format!("Application for {} position at {}", job.title, job.company),
            body: format!(
                "Please find my application for the {} position attached.\n\n{}",
                job.title, self.outreach.sender_name
            ),
            attachments,
            references: Vec::new(),
        }
    }
}
