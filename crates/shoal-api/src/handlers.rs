//! REST API handlers.
//!
//! Each handler calls into the `Scheduler` and returns JSON responses.
//! Structural operations answer `202 Accepted` once dispatched; callers
//! poll the application until it settles.

use std::time::Duration;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use shoal_canary::{CanaryUpdateRequest, CreateAppRequest, WeightUpdateRequest};
use shoal_scheduler::SchedulerError;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

/// HTTP status for a scheduler error.
fn status_for(err: &SchedulerError) -> StatusCode {
    match err {
        SchedulerError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        SchedulerError::NotFound(_) => StatusCode::NOT_FOUND,
        SchedulerError::StateConflict(_) => StatusCode::CONFLICT,
        SchedulerError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        SchedulerError::PartialFailure(_) => StatusCode::BAD_GATEWAY,
        SchedulerError::Internal(_) | SchedulerError::State(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn scheduler_error(err: SchedulerError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!(error = %err, %status, "request failed");
    }
    error_response(&err.to_string(), status)
}

fn rejection(err: JsonRejection) -> Response {
    error_response(&err.body_text(), StatusCode::BAD_REQUEST)
}

// ── Applications ───────────────────────────────────────────────

/// GET /api/v1/apps
pub async fn list_apps(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.scheduler.list_apps().await)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedApp {
    pub id: String,
}

/// POST /api/v1/apps
pub async fn create_app(
    State(state): State<ApiState>,
    payload: Result<Json<CreateAppRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(e) => return rejection(e),
    };
    match state.scheduler.create_app(req).await {
        Ok(id) => {
            info!(app = %id, "application accepted");
            (StatusCode::CREATED, ApiResponse::ok(CreatedApp { id })).into_response()
        }
        Err(e) => scheduler_error(e),
    }
}

/// GET /api/v1/apps/{id}
pub async fn get_app(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.scheduler.inspect(&id).await {
        Ok(summary) => ApiResponse::ok(summary).into_response(),
        Err(e) => scheduler_error(e),
    }
}

/// Query parameters for DELETE.
#[derive(Debug, Default, Deserialize)]
pub struct RemoveParams {
    pub timeout_secs: Option<u64>,
}

/// DELETE /api/v1/apps/{id}
pub async fn remove_app(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(params): Query<RemoveParams>,
) -> impl IntoResponse {
    let timeout = params
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(state.remove_timeout);
    match state.scheduler.remove_app(&id, timeout).await {
        Ok(()) => ApiResponse::ok("removed").into_response(),
        Err(e) => scheduler_error(e),
    }
}

// ── Canary & weights ───────────────────────────────────────────

/// POST /api/v1/apps/{id}/canary
pub async fn create_canary(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    payload: Result<Json<CanaryUpdateRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(e) => return rejection(e),
    };
    match state.scheduler.create_canary(&id, req).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            ApiResponse::ok(serde_json::json!({ "id": id, "status": "accepted" })),
        )
            .into_response(),
        Err(e) => scheduler_error(e),
    }
}

/// PATCH /api/v1/apps/{id}/weights
pub async fn update_weights(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    payload: Result<Json<WeightUpdateRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(e) => return rejection(e),
    };
    match state.scheduler.update_weights(&id, req).await {
        Ok(weights) => (StatusCode::ACCEPTED, ApiResponse::ok(weights)).into_response(),
        Err(e) => scheduler_error(e),
    }
}

// ── Versions & tasks ───────────────────────────────────────────

/// GET /api/v1/apps/{id}/versions
pub async fn list_versions(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.scheduler.list_versions(&id).await {
        Ok(versions) => ApiResponse::ok(versions).into_response(),
        Err(e) => scheduler_error(e),
    }
}

/// GET /api/v1/apps/{id}/tasks
pub async fn list_tasks(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.scheduler.list_tasks(&id).await {
        Ok(tasks) => ApiResponse::ok(tasks).into_response(),
        Err(e) => scheduler_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use shoal_scheduler::{LocalExecutor, Scheduler, wait_for_status};
    use shoal_state::{OpStatus, StateStore, VersionSpec};

    fn test_state() -> ApiState {
        let store = StateStore::open_in_memory().unwrap();
        ApiState::new(Scheduler::new(store, Arc::new(LocalExecutor::instant())))
    }

    fn spec(mem: f64) -> VersionSpec {
        VersionSpec {
            name: "web".to_string(),
            cpu: 0.1,
            mem,
            disk: 0.0,
            image: Some("nginx:1.27".to_string()),
            cmd: None,
            env: HashMap::new(),
            labels: HashMap::new(),
        }
    }

    async fn running_app(state: &ApiState, instances: u32) -> String {
        let id = state
            .scheduler
            .create_app(CreateAppRequest {
                version: spec(5.0),
                instances,
            })
            .await
            .unwrap();
        wait_for_status(
            &state.scheduler,
            &id,
            OpStatus::Noop,
            Duration::from_secs(5),
            Duration::from_millis(5),
        )
        .await
        .unwrap();
        id
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            status_for(&SchedulerError::InvalidArgument("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&SchedulerError::StateConflict("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&SchedulerError::Timeout {
                what: "x".into(),
                elapsed: Duration::from_secs(1)
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&SchedulerError::PartialFailure("x".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn list_apps_empty() {
        let state = test_state();
        let resp = list_apps(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_returns_created() {
        let state = test_state();
        let req = CreateAppRequest {
            version: spec(5.0),
            instances: 3,
        };
        let resp = create_app(State(state.clone()), Ok(Json(req)))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(state.scheduler.list_apps().await.len(), 1);
    }

    #[tokio::test]
    async fn create_with_zero_instances_is_bad_request() {
        let state = test_state();
        let req = CreateAppRequest {
            version: spec(5.0),
            instances: 0,
        };
        let resp = create_app(State(state), Ok(Json(req))).await.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_nonexistent_app() {
        let state = test_state();
        let resp = get_app(State(state), Path("app_nope".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn canary_accepted_then_conflicts() {
        let state = test_state();
        let id = running_app(&state, 5).await;
        let req = || CanaryUpdateRequest {
            version: spec(10.0),
            instances: 3,
            value: 0.5,
            on_failure: Default::default(),
            delay: 0.0,
        };

        let resp = create_canary(State(state.clone()), Path(id.clone()), Ok(Json(req())))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        wait_for_status(
            &state.scheduler,
            &id,
            OpStatus::CanaryUnfinished,
            Duration::from_secs(5),
            Duration::from_millis(5),
        )
        .await
        .unwrap();

        let resp = create_canary(State(state), Path(id), Ok(Json(req())))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn weights_without_canary_conflict() {
        let state = test_state();
        let id = running_app(&state, 2).await;
        let resp = update_weights(
            State(state),
            Path(id),
            Ok(Json(WeightUpdateRequest { value: 0.5 })),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn remove_unknown_is_ok() {
        let state = test_state();
        let resp = remove_app(
            State(state),
            Path("app_nope".to_string()),
            Query(RemoveParams::default()),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn list_tasks_of_running_app() {
        let state = test_state();
        let id = running_app(&state, 4).await;
        let resp = list_tasks(State(state.clone()), Path(id.clone()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = list_versions(State(state), Path(id)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
