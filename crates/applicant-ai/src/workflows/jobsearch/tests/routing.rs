use serde_json::Value;
use tower::ServiceExt;

use super::common::*;
use crate::workflows::jobsearch::domain::ResponseClassification;
use crate::workflows::jobsearch::gateways::SendReceipt;
use crate::workflows::jobsearch::router::pipeline_router;

async fn read_json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[tokio::test]
async fn status_route_reports_pipeline_counts() {
    let (controller, _, _) = build_controller();
    let now = dt(2026, 3, 2, 9, 0);
    controller
        .record_submission(
            sample_job(),
            SendReceipt {
                message_id: "msg-1".to_string(),
            },
            now,
        )
        .expect("submission tracked");
    let router = pipeline_router(controller);

    let response = router
        .oneshot(
            axum::http::Request::get("/api/v1/pipeline/status")
                .body(axum::body::Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("active_applications"), Some(&Value::from(1)));
    assert_eq!(payload.get("completed_applications"), Some(&Value::from(0)));
    assert_eq!(
        payload
            .get("statuses")
            .and_then(|statuses| statuses.get("applied")),
        Some(&Value::from(1))
    );
}

#[tokio::test]
async fn application_route_returns_the_tracked_view() {
    let (controller, _, _) = build_controller();
    let now = dt(2026, 3, 2, 9, 0);
    controller
        .record_submission(
            sample_job(),
            SendReceipt {
                message_id: "msg-1".to_string(),
            },
            now,
        )
        .expect("submission tracked");
    let router = pipeline_router(controller);

    let response = router
        .oneshot(
            axum::http::Request::get("/api/v1/pipeline/applications/msg-1")
                .body(axum::body::Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status"), Some(&Value::from("applied")));
    assert_eq!(payload.get("company"), Some(&Value::from("Initech")));
}

#[tokio::test]
async fn application_route_returns_not_found_for_unknown_ids() {
    let (controller, _, _) = build_controller();
    let router = pipeline_router(controller);

    let response = router
        .oneshot(
            axum::http::Request::get("/api/v1/pipeline/applications/ghost")
                .body(axum::body::Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn offer_route_conflicts_before_an_offer_exists() {
    let (controller, _, _) = build_controller();
    let now = dt(2026, 3, 2, 9, 0);
    controller
        .record_submission(
            sample_job(),
            SendReceipt {
                message_id: "msg-1".to_string(),
            },
            now,
        )
        .expect("submission tracked");
    let router = pipeline_router(controller);

    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/pipeline/applications/msg-1/offer")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(r#"{"accept": true}"#))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn offer_route_accepts_a_received_offer() {
    let (controller, _, _) = build_controller();
    let now = dt(2026, 3, 2, 9, 0);
    controller
        .record_submission(
            sample_job(),
            SendReceipt {
                message_id: "msg-1".to_string(),
            },
            now,
        )
        .expect("submission tracked");
    controller
        .handle_response(
            &interview_request("msg-1", "resp-1", now, vec![dt(2026, 3, 3, 10, 0)]),
            now,
        )
        .await
        .expect("interview scheduled");
    controller.complete_elapsed_interviews(dt(2026, 3, 3, 12, 0));
    controller
        .handle_response(
            &classified(
                "msg-1",
                "resp-2",
                ResponseClassification::Offer,
                dt(2026, 3, 3, 13, 0),
            ),
            dt(2026, 3, 3, 13, 0),
        )
        .await
        .expect("offer recorded");
    let router = pipeline_router(controller);

    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/pipeline/applications/msg-1/offer")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(r#"{"accept": true}"#))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status"), Some(&Value::from("accepted")));
}

#[tokio::test]
async fn alternatives_route_guards_on_pending_conflicts() {
    let (controller, _, _) = build_controller();
    let now = dt(2026, 3, 2, 9, 0);
    controller
        .record_submission(
            sample_job(),
            SendReceipt {
                message_id: "msg-1".to_string(),
            },
            now,
        )
        .expect("submission tracked");
    let router = pipeline_router(controller);

    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/pipeline/applications/msg-1/alternatives")
                .body(axum::body::Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), axum::http::StatusCode::CONFLICT);
}
