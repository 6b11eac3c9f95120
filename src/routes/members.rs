//! Member routes. Reads are public; writes require a bearer token (see `AdminCaller`).

use crate::handlers::members::{create, delete as delete_handler, list, read, update};
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, routing::get, Router};

/// JSON bodies may carry an inline base64 photo.
pub const JSON_BODY_LIMIT: usize = 10 * 1024 * 1024;

pub fn member_routes(state: AppState) -> Router {
    Router::new()
        .route("/members", get(list).post(create))
        .route("/members/:id", get(read).put(update).delete(delete_handler))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .with_state(state)
}
