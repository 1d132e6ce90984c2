use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        jobdtos::{ApplyJobDto, CreateJobDto, UpdateJobStatusDto},
        RequestQueryDto,
    },
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn jobs_handler() -> Router {
    Router::new()
        .route("/", get(list_open_jobs).post(create_job))
        .route("/:job_id", get(get_job))
        .route("/:job_id/accept", post(accept_job))
        .route("/:job_id/status", patch(update_job_status))
        .route(
            "/:job_id/applications",
            get(list_applications).post(apply_to_job),
        )
        .route(
            "/:job_id/applications/:application_id/select",
            post(select_application),
        )
}

pub async fn list_open_jobs(
    Extension(app_state): Extension<Arc<AppState>>,
    Query(query): Query<RequestQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let (limit, offset) = query.limit_offset(20);
    let jobs = app_state.job_service.list_open_jobs(limit, offset).await?;

    Ok(Json(json!({
        "status": "success",
        "data": jobs,
    })))
}

pub async fn create_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateJobDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let job = app_state.job_service.post_job(&auth.user, body.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "data": job,
        })),
    ))
}

pub async fn get_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.get_job(job_id).await?;

    Ok(Json(json!({
        "status": "success",
        "data": job,
    })))
}

pub async fn accept_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.accept_job(&auth.user, job_id).await?;

    Ok(Json(json!({
        "status": "success",
        "data": job,
    })))
}

pub async fn update_job_status(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<UpdateJobStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let job = app_state
        .job_service
        .update_status(&auth.user, job_id, body.status, body.expected_status)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": job,
    })))
}

pub async fn list_applications(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let applications = app_state
        .job_service
        .list_applications(&auth.user, job_id)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": applications,
    })))
}

pub async fn apply_to_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<ApplyJobDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let application = app_state
        .job_service
        .apply_to_job(&auth.user, job_id, body.cover_letter, body.proposed_rate)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "data": application,
        })),
    ))
}

pub async fn select_application(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path((job_id, application_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HttpError> {
    let selection = app_state
        .job_service
        .select_application(&auth.user, job_id, application_id)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "data": selection,
    })))
}
