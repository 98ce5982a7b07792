//! shoal-api: REST API for Shoal.
//!
//! Transport only: every handler forwards to the [`Scheduler`] and maps
//! its result onto the JSON envelope and an HTTP status.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/apps` | List applications |
//! | POST | `/api/v1/apps` | Create an application |
//! | GET | `/api/v1/apps/{id}` | Inspect an application |
//! | DELETE | `/api/v1/apps/{id}` | Remove an application |
//! | POST | `/api/v1/apps/{id}/canary` | Start a canary |
//! | PATCH | `/api/v1/apps/{id}/weights` | Shift traffic between versions |
//! | GET | `/api/v1/apps/{id}/versions` | List versions |
//! | GET | `/api/v1/apps/{id}/tasks` | List tasks |

pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::routing::{get, patch, post};
use shoal_scheduler::Scheduler;

/// Removal timeout used when the request does not name one.
pub const DEFAULT_REMOVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Scheduler,
    pub remove_timeout: Duration,
}

impl ApiState {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            remove_timeout: DEFAULT_REMOVE_TIMEOUT,
        }
    }
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/apps", get(handlers::list_apps).post(handlers::create_app))
        .route("/apps/{id}", get(handlers::get_app).delete(handlers::remove_app))
        .route("/apps/{id}/canary", post(handlers::create_canary))
        .route("/apps/{id}/weights", patch(handlers::update_weights))
        .route("/apps/{id}/versions", get(handlers::list_versions))
        .route("/apps/{id}/tasks", get(handlers::list_tasks))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
