//! Upload route and static serving of stored files.

use crate::handlers::uploads::upload;
use crate::media::MAX_UPLOAD_BYTES;
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, routing::post, Router};
use std::path::Path;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn upload_routes(state: AppState) -> Router {
    Router::new()
        .route("/uploads", post(upload))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD))
        .with_state(state)
}

/// GET /uploads/* served from `dir`.
pub fn uploaded_files(dir: &Path) -> Router {
    Router::new().nest_service("/uploads", ServeDir::new(dir))
}
