use std::sync::Arc;

use applicant_ai::error::AppError;
use applicant_ai::workflows::jobsearch::{
    Application, ApplicationRegistry, FollowUpPolicy, LifecycleController, Orchestrator,
    OutreachConfig, PollConfig, PollSummary, Response, ResponseClassification, SchedulingConfig,
    SearchCriteria, TimeSlot,
};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use clap::Args;

use crate::infra::{
    seeded_postings, InMemoryCalendarGateway, InMemoryMailGateway, RequiredFieldExtractor,
    SeededJobSource,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Start date for the demo timeline (YYYY-MM-DD, defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

type DemoOrchestrator = Orchestrator<
    SeededJobSource,
    RequiredFieldExtractor,
    InMemoryMailGateway,
    InMemoryCalendarGateway,
>;

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let start = today.and_hms_opt(9, 0, 0).expect("valid time");

    let outreach = OutreachConfig {
        sender_name: "Jordan Doe".to_string(),
        sender_email: "jordan.doe@example.com".to_string(),
        resume_path: "./materials/resume.pdf".to_string(),
        cover_letter_path: None,
    };

    let mail = Arc::new(InMemoryMailGateway::default());
    let calendar = Arc::new(InMemoryCalendarGateway::default());
    let registry = Arc::new(ApplicationRegistry::new(
        FollowUpPolicy::default().max_follow_ups,
    ));
    let controller = Arc::new(LifecycleController::new(
        registry.clone(),
        mail.clone(),
        calendar.clone(),
        FollowUpPolicy::default(),
        SchedulingConfig::default(),
        outreach.clone(),
    ));
    let orchestrator: DemoOrchestrator = Orchestrator::new(
        Arc::new(SeededJobSource::new(seeded_postings(today))),
        Arc::new(RequiredFieldExtractor {
            today,
            max_age_days: 30,
        }),
        mail.clone(),
        controller.clone(),
        SearchCriteria::default(),
        outreach,
        PollConfig::default(),
    );

    println!("Job search pipeline demo (timeline starts {today})");

    let summary = orchestrator.run_search_pass(start).await;
    println!(
        "\nSearch-and-apply pass: {} postings found, {} valid, {} applications sent",
        summary.jobs_found, summary.jobs_processed, summary.applications_sent
    );
    print_board(&registry);

    // Day 0, afternoon: one rejection and one interview request whose first
    // proposed time collides with an existing meeting.
    let initech = application_for(&registry, "Initech");
    let globex = application_for(&registry, "Globex");
    let tomorrow_ten = (today + Duration::days(1))
        .and_hms_opt(10, 0, 0)
        .expect("valid time");
    let tomorrow_one = (today + Duration::days(1))
        .and_hms_opt(13, 0, 0)
        .expect("valid time");
    calendar.mark_busy(TimeSlot::from_start(tomorrow_ten, 60));

    mail.enqueue_response(Response {
        external_id: "in-001".to_string(),
        reference_id: initech.outbound_message_id.clone(),
        classification: ResponseClassification::Rejection,
        received_at: start + Duration::hours(3),
        proposed_times: Vec::new(),
    });
    mail.enqueue_response(Response {
        external_id: "in-002".to_string(),
        reference_id: globex.outbound_message_id.clone(),
        classification: ResponseClassification::InterviewRequest,
        received_at: start + Duration::hours(3),
        proposed_times: vec![tomorrow_ten, tomorrow_one],
    });

    let cycle = poll(&orchestrator, start + Duration::hours(4)).await?;
    println!(
        "\nDay 0 poll: {} new responses, {} active, {} completed",
        cycle.new_responses, cycle.active_applications, cycle.completed_applications
    );
    print_board(&registry);

    // Day 1: the interview elapses.
    let cycle = poll(&orchestrator, tomorrow_one + Duration::hours(2)).await?;
    println!(
        "\nDay 1 poll: {} interview(s) completed",
        cycle.interviews_completed
    );

    // Day 2: the offer lands and is accepted.
    mail.enqueue_response(Response {
        external_id: "in-003".to_string(),
        reference_id: globex.outbound_message_id.clone(),
        classification: ResponseClassification::Offer,
        received_at: start + Duration::days(2),
        proposed_times: Vec::new(),
    });
    let cycle = poll(&orchestrator, start + Duration::days(2)).await?;
    println!("\nDay 2 poll: {} new response(s)", cycle.new_responses);
    let accepted = controller
        .resolve_offer(&globex.id, true, start + Duration::days(2) + Duration::hours(1))
        .map_err(AppError::from)?;
    println!(
        "Accepted the {} offer from {}",
        accepted.job.title, accepted.job.company
    );

    // Day 6: the silent application gets its first follow-up.
    let cycle = poll(&orchestrator, start + Duration::days(6)).await?;
    println!("\nDay 6 poll: {} follow-up(s) sent", cycle.follow_ups_sent);
    print_board(&registry);

    println!(
        "\nOutbound emails sent: {} | calendar events created: {}",
        mail.sent_emails().len(),
        calendar.created_events().len()
    );

    Ok(())
}

async fn poll(
    orchestrator: &DemoOrchestrator,
    now: NaiveDateTime,
) -> Result<PollSummary, AppError> {
    orchestrator.poll_cycle(now).await.map_err(AppError::from)
}

fn application_for(registry: &ApplicationRegistry, company: &str) -> Application {
    registry
        .snapshot()
        .into_iter()
        .find(|app| app.job.company == company)
        .expect("demo application tracked")
}

fn print_board(registry: &ApplicationRegistry) {
    let mut apps = registry.snapshot();
    apps.sort_by(|a, b| a.job.company.cmp(&b.job.company));
    println!("Application board:");
    for app in apps {
        let note = match (&app.interview, app.awaiting_alternatives) {
            (Some(interview), _) => format!(
                " | interview {} ({})",
                interview.scheduled_for,
                interview.status.label()
            ),
            (None, true) => " | awaiting alternative times".to_string(),
            _ => String::new(),
        };
        println!(
            "- {} at {} -> {}{} (follow-ups: {})",
            app.job.title,
            app.job.company,
            app.status.label(),
            note,
            app.follow_ups_sent
        );
    }
}
