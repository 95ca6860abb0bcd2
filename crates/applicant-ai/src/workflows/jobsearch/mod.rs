//! Job search automation pipeline.
//!
//! The lifecycle controller drives each tracked application through its state
//! machine, the slot finder searches calendar availability for interview
//! times, and the orchestrator runs the one-shot search-and-apply pass plus
//! the indefinite poll loop. External job boards, email, and calendars sit
//! behind the capability traits in [`gateways`].

pub mod domain;
pub mod followup;
pub mod gateways;
pub mod lifecycle;
pub mod orchestrator;
pub mod registry;
pub mod router;
pub mod scheduling;

#[cfg(test)]
mod tests;

pub use domain::{
    Application, ApplicationId, ApplicationStatus, Interview, InterviewStatus, JobSnapshot,
    Response, ResponseClassification, TimeSlot,
};
pub use followup::FollowUpPolicy;
pub use gateways::{
    CalendarGateway, EventReceipt, EventRequest, ExtractionError, Extractor, GatewayError,
    JobSource, MailGateway, OutboundEmail, OutreachConfig, RawPosting, SearchCriteria, SendReceipt,
};
pub use lifecycle::{FollowUpSweep, LifecycleController, LifecycleError, ResponseDisposition};
pub use orchestrator::{Orchestrator, PollConfig, PollSummary, SearchSummary};
pub use registry::{ApplicationRegistry, RegistryError};
pub use router::{pipeline_router, ApplicationStatusView, InterviewView};
pub use scheduling::{SchedulingConfig, SlotFinder, SlotQuery, WorkingHours};
