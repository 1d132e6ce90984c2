use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{get, patch},
    Extension, Json, Router,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::RequestQueryDto,
    error::HttpError,
    middleware::JWTAuthMiddeware,
    models::chatmodel::Viewer,
    AppState,
};

pub fn notification_handler() -> Router {
    Router::new()
        .route("/", get(get_notifications))
        .route("/read-all", patch(mark_all_notifications_read))
        .route("/:notification_id/read", patch(mark_notification_read))
}

pub async fn get_notifications(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(query): Query<RequestQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let (limit, offset) = query.limit_offset(20);
    let notifications = app_state
        .notification_service
        .get_user_notifications(auth.user.id, limit, offset)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": notifications,
    })))
}

pub async fn mark_notification_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let notification = app_state
        .notification_service
        .mark_notification_read(Viewer::from(&auth.user), notification_id)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": notification,
    })))
}

pub async fn mark_all_notifications_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let updated = app_state
        .notification_service
        .mark_all_read(Viewer::from(&auth.user))
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "updated": updated },
    })))
}

/// Combined badge counts; the polling backstop hits this every few seconds.
pub async fn get_unread_count(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let counts = app_state
        .notification_service
        .get_unread_counts(Viewer::from(&auth.user))
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": counts,
    })))
}
