//! Routers for the public API.

mod common;
mod members;
mod uploads;

pub use common::common_routes;
pub use members::{member_routes, JSON_BODY_LIMIT};
pub use uploads::{upload_routes, uploaded_files};

use crate::state::AppState;
use axum::Router;

/// Member and upload routes, meant to be nested under `/api`.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .merge(member_routes(state.clone()))
        .merge(upload_routes(state))
}
