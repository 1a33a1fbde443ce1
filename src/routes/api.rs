use axum::routing::{get, post};
use axum::Router;

use crate::handlers::api::{health_check, update_context};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/admin/context", post(update_context))
}
