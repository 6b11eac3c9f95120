//! Member handlers: list, read, create, update, delete.

use crate::error::AppError;
use crate::extractors::{AdminCaller, JsonBody};
use crate::response::{success_many, success_one, success_one_ok};
use crate::service::MemberInput;
use crate::state::AppState;
use crate::store::MemberId;
use axum::extract::{Path, State};
use serde_json::json;

fn parse_id(id_str: &str) -> Result<MemberId, AppError> {
    id_str
        .parse()
        .map_err(|_| AppError::BadRequest("invalid id".into()))
}

pub async fn list(State(state): State<AppState>) -> Result<impl axum::response::IntoResponse, AppError> {
    let rows = state.members.list().await?;
    Ok(success_many(rows))
}

pub async fn read(
    State(state): State<AppState>,
    Path(id_str): Path<String>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    let member = state.members.get(id).await?;
    Ok(success_one_ok(member))
}

pub async fn create(
    AdminCaller(caller): AdminCaller,
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let input = MemberInput::from_json(body)?;
    let id = state.members.create(input).await?;
    tracing::debug!(id, caller = %caller.subject, "create member");
    Ok(success_one(json!({ "id": id })))
}

pub async fn update(
    AdminCaller(caller): AdminCaller,
    State(state): State<AppState>,
    Path(id_str): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    let input = MemberInput::from_json(body)?;
    let member = state.members.update(id, input).await?;
    tracing::debug!(id, caller = %caller.subject, "update member");
    Ok(success_one_ok(member))
}

pub async fn delete(
    AdminCaller(caller): AdminCaller,
    State(state): State<AppState>,
    Path(id_str): Path<String>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    state.members.delete(id).await?;
    tracing::debug!(id, caller = %caller.subject, "delete member");
    Ok(success_one_ok(json!({ "id": id })))
}
