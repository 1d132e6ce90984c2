use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;
use validator::Validate;

use crate::{
    dtos::{chatdtos::SendMessageDto, RequestQueryDto},
    error::HttpError,
    middleware::JWTAuthMiddeware,
    models::chatmodel::ThreadKey,
    service::error::ServiceError,
    AppState,
};

pub fn chat_handler() -> Router {
    Router::new()
        .route("/", post(send_message))
        .route("/conversations", get(get_conversations))
        .route("/threads/:thread_key", get(get_thread_messages))
        .route("/threads/:thread_key/read", post(mark_thread_read))
}

fn parse_thread_key(raw: &str) -> Result<ThreadKey, HttpError> {
    raw.parse::<ThreadKey>()
        .map_err(|_| ServiceError::ThreadNotFound(raw.to_string()).into())
}

pub async fn send_message(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<SendMessageDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let message = app_state
        .chat_service
        .send_message(&auth.user, body.job_id, body.receiver_id, body.content)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "data": message,
        })),
    ))
}

pub async fn get_conversations(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let conversations = app_state.chat_service.get_conversations(&auth.user).await?;

    Ok(Json(json!({
        "status": "success",
        "data": conversations,
    })))
}

pub async fn get_thread_messages(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(thread_key): Path<String>,
    Query(query): Query<RequestQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;
    let thread = parse_thread_key(&thread_key)?;

    let (limit, offset) = query.limit_offset(100);
    let messages = app_state
        .chat_service
        .get_thread_messages(&auth.user, thread, limit, offset)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": messages,
    })))
}

pub async fn mark_thread_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(thread_key): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let thread = parse_thread_key(&thread_key)?;

    let updated = app_state
        .chat_service
        .mark_thread_read(&auth.user, thread)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": {
            "thread_key": thread,
            "updated": updated,
        },
    })))
}
