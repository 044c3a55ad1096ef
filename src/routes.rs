use crate::capture::CapturedImage;
use crate::sensors::{SimulationScenario, UnknownScenario};
use crate::state::{Session, Snapshot};
use crate::workflow::WorkflowError;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

/// `max_upload_bytes` bounds request bodies; captured photos arrive as
/// base64 data URLs inside the JSON body of `/api/analysis`.
pub fn router(session: Session, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/events", get(events))
        .route("/api/sensors/toggle", post(toggle_sensors))
        .route("/api/sensors/scenario", put(select_scenario))
        .route("/api/analysis", post(submit_analysis))
        .route("/api/reset", post(reset))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(session)
}

pub enum ApiError {
    Workflow(WorkflowError),
    Scenario(UnknownScenario),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Workflow(e @ WorkflowError::Busy) => (StatusCode::CONFLICT, e.to_string()),
            ApiError::Workflow(e @ WorkflowError::InvalidCapture(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            ApiError::Scenario(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Deserialize)]
struct ScenarioBody {
    scenario: String,
}

async fn get_state(State(session): State<Session>) -> Json<Snapshot> {
    Json(session.snapshot())
}

async fn toggle_sensors(State(session): State<Session>) -> Json<Snapshot> {
    Json(session.toggle_connect())
}

async fn select_scenario(
    State(session): State<Session>,
    Json(body): Json<ScenarioBody>,
) -> Result<Json<Snapshot>, ApiError> {
    let scenario: SimulationScenario = body.scenario.parse().map_err(ApiError::Scenario)?;
    Ok(Json(session.select_scenario(scenario)))
}

async fn submit_analysis(
    State(session): State<Session>,
    Json(image): Json<CapturedImage>,
) -> Result<(StatusCode, Json<Snapshot>), ApiError> {
    // The analysis keeps running if the client goes away.
    let pending = session.submit(image).map_err(ApiError::Workflow)?;
    Ok((StatusCode::ACCEPTED, Json(pending.snapshot().clone())))
}

async fn reset(State(session): State<Session>) -> Json<Snapshot> {
    Json(session.reset())
}

// Server-sent events: one snapshot per state change, current state first.
async fn events(State(session): State<Session>) -> impl IntoResponse {
    let mut updates = session.subscribe();

    let stream = async_stream::stream! {
        loop {
            let snapshot = updates.borrow_and_update().clone();

            match serde_json::to_string(&snapshot) {
                Ok(json) => {
                    yield Ok::<_, std::io::Error>(Bytes::from(format!("data: {}\n\n", json)));
                }
                Err(e) => {
                    error!(error = %e, "failed to encode snapshot");
                }
            }

            if updates.changed().await.is_err() {
                break;
            }
        }
    };

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
}
