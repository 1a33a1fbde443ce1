use axum::routing::get;
use axum::Router;

use crate::handlers::ws::websocket_handler;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(websocket_handler))
}
