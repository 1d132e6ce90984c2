use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    error::{ErrorMessage, HttpError},
    models::jobmodel::JobStatus,
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error("Application {0} not found")]
    ApplicationNotFound(Uuid),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("Notification {0} not found")]
    NotificationNotFound(Uuid),

    #[error("Thread '{0}' not found")]
    ThreadNotFound(String),

    #[error("User {0} is not allowed to {1}")]
    PermissionDenied(Uuid, &'static str),

    #[error("Job {job_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job {0} has already been accepted")]
    AlreadyAccepted(Uuid),

    #[error("Job {0} is no longer open")]
    JobNotOpen(Uuid),

    #[error("Job {job_id} is no longer {expected:?}")]
    StaleStatus { job_id: Uuid, expected: JobStatus },

    #[error("You have already applied to job {0}")]
    DuplicateApplication(Uuid),

    #[error("Application {0} has already been resolved")]
    ApplicationResolved(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::JobNotFound(_)
            | ServiceError::ApplicationNotFound(_)
            | ServiceError::UserNotFound(_)
            | ServiceError::NotificationNotFound(_)
            | ServiceError::ThreadNotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::PermissionDenied(_, _) => StatusCode::FORBIDDEN,

            ServiceError::InvalidTransition { .. } | ServiceError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }

            ServiceError::AlreadyAccepted(_)
            | ServiceError::JobNotOpen(_)
            | ServiceError::StaleStatus { .. }
            | ServiceError::DuplicateApplication(_)
            | ServiceError::ApplicationResolved(_) => StatusCode::CONFLICT,

            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match &error {
            ServiceError::Database(e) => {
                tracing::error!("Database error: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
            _ => HttpError::new(error.to_string(), error.status_code()),
        }
    }
}
