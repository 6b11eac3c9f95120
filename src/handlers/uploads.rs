//! Upload handler: multipart body with one file field, stored through the media capability.

use crate::error::AppError;
use crate::extractors::AdminCaller;
use crate::response::success_one;
use crate::state::AppState;
use axum::extract::{Multipart, State};
use serde_json::json;

/// POST /uploads: the first field carrying a file name is stored; its public path is returned.
pub async fn upload(
    AdminCaller(caller): AdminCaller,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl axum::response::IntoResponse, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        let data = field.bytes().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
        let path = state.media.store(&file_name, &content_type, &data).await?;
        tracing::debug!(path = %path, caller = %caller.subject, "upload");
        return Ok(success_one(json!({ "path": path })));
    }
    Err(AppError::BadRequest("multipart body has no file field".into()))
}
