use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{Application, ApplicationId};
use super::gateways::{CalendarGateway, MailGateway};
use super::lifecycle::{LifecycleController, LifecycleError};
use super::registry::RegistryError;

/// Router builder exposing the pipeline status surface.
pub fn pipeline_router<M, C>(controller: Arc<LifecycleController<M, C>>) -> Router
where
    M: MailGateway + 'static,
    C: CalendarGateway + 'static,
{
    Router::new()
        .route("/api/v1/pipeline/status", get(status_handler::<M, C>))
        .route(
            "/api/v1/pipeline/applications/:application_id",
            get(application_handler::<M, C>),
        )
        .route(
            "/api/v1/pipeline/applications/:application_id/offer",
            post(offer_handler::<M, C>),
        )
        .route(
            "/api/v1/pipeline/applications/:application_id/alternatives",
            post(alternatives_handler::<M, C>),
        )
        .with_state(controller)
}

/// Sanitized representation of one application's exposed state.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub status: &'static str,
    pub company: String,
    pub title: String,
    pub follow_ups_sent: u8,
    pub awaiting_alternatives: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interview: Option<InterviewView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterviewView {
    pub event_id: String,
    pub scheduled_for: NaiveDateTime,
    pub status: &'static str,
}

impl ApplicationStatusView {
    pub fn from_application(app: &Application) -> Self {
        Self {
            application_id: app.id.clone(),
            status: app.status.label(),
            company: app.job.company.clone(),
            title: app.job.title.clone(),
            follow_ups_sent: app.follow_ups_sent,
            awaiting_alternatives: app.awaiting_alternatives,
            interview: app.interview.as_ref().map(|interview| InterviewView {
                event_id: interview.event_id.clone(),
                scheduled_for: interview.scheduled_for,
                status: interview.status.label(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct PipelineStatusView {
    active_applications: usize,
    completed_applications: usize,
    statuses: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OfferDecisionRequest {
    accept: bool,
}

pub(crate) async fn status_handler<M, C>(
    State(controller): State<Arc<LifecycleController<M, C>>>,
) -> Response
where
    M: MailGateway + 'static,
    C: CalendarGateway + 'static,
{
    let registry = controller.registry();
    let view = PipelineStatusView {
        active_applications: registry.active_count(),
        completed_applications: registry.completed_count(),
        statuses: registry.status_counts(),
    };
    (StatusCode::OK, axum::Json(view)).into_response()
}

pub(crate) async fn application_handler<M, C>(
    State(controller): State<Arc<LifecycleController<M, C>>>,
    Path(application_id): Path<String>,
) -> Response
where
    M: MailGateway + 'static,
    C: CalendarGateway + 'static,
{
    let id = ApplicationId(application_id);
    match controller.registry().get(&id) {
        Ok(app) => {
            let view = ApplicationStatusView::from_application(&app);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(RegistryError::NotFound(id)) => not_found(&id),
        Err(err) => internal_error(&err),
    }
}

pub(crate) async fn offer_handler<M, C>(
    State(controller): State<Arc<LifecycleController<M, C>>>,
    Path(application_id): Path<String>,
    axum::Json(decision): axum::Json<OfferDecisionRequest>,
) -> Response
where
    M: MailGateway + 'static,
    C: CalendarGateway + 'static,
{
    let id = ApplicationId(application_id);
    let now = Local::now().naive_local();
    match controller.resolve_offer(&id, decision.accept, now) {
        Ok(app) => {
            let view = ApplicationStatusView::from_application(&app);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(LifecycleError::Registry(RegistryError::NotFound(id))) => not_found(&id),
        Err(LifecycleError::Registry(RegistryError::InvalidTransition { from, to })) => {
            let payload = json!({
                "error": format!("cannot move application from {} to {}", from.label(), to.label()),
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(err) => internal_error(&err),
    }
}

pub(crate) async fn alternatives_handler<M, C>(
    State(controller): State<Arc<LifecycleController<M, C>>>,
    Path(application_id): Path<String>,
) -> Response
where
    M: MailGateway + 'static,
    C: CalendarGateway + 'static,
{
    let id = ApplicationId(application_id);
    let now = Local::now().naive_local();
    match controller.propose_alternatives(&id, now).await {
        Ok(slots) => {
            let payload = json!({ "application_id": id.0, "slots": slots });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(LifecycleError::Registry(RegistryError::NotFound(id))) => not_found(&id),
        Err(LifecycleError::NoPendingConflict(id)) => {
            let payload = json!({
                "error": format!("application {id} has no pending scheduling conflict"),
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(LifecycleError::Gateway(err)) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::BAD_GATEWAY, axum::Json(payload)).into_response()
        }
        Err(err) => internal_error(&err),
    }
}

fn not_found(id: &str) -> Response {
    let payload = json!({ "error": format!("application {id} not found") });
    (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
}

fn internal_error(err: &dyn std::fmt::Display) -> Response {
    let payload = json!({ "error": err.to_string() });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}
