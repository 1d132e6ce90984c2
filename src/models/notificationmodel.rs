// models/notificationmodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    JobApplication,
    ApplicationSelected,
    ApplicationRejected,
    JobAccepted,
    JobStatusChanged,
    JobCancelled,
}

impl NotificationType {
    pub fn to_str(&self) -> &str {
        match self {
            NotificationType::JobApplication => "job_application",
            NotificationType::ApplicationSelected => "application_selected",
            NotificationType::ApplicationRejected => "application_rejected",
            NotificationType::JobAccepted => "job_accepted",
            NotificationType::JobStatusChanged => "job_status_changed",
            NotificationType::JobCancelled => "job_cancelled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_id: Option<Uuid>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for a notification row.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub job_id: Option<Uuid>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
}

/// Badge counts. Always recomputed from rows, never stored.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnreadCounts {
    pub messages: i64,
    pub notifications: i64,
    pub total: i64,
}

impl UnreadCounts {
    pub fn new(messages: i64, notifications: i64) -> Self {
        let messages = messages.max(0);
        let notifications = notifications.max(0);
        UnreadCounts {
            messages,
            notifications,
            total: messages + notifications,
        }
    }
}
