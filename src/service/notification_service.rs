// service/notification_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{ChatExt, NotificationExt, Store, UserExt},
    models::{
        chatmodel::Viewer,
        jobmodel::{Job, JobApplication, JobStatus},
        notificationmodel::*,
        realtimemodel::ServerFrame,
    },
    service::{error::ServiceError, events::EventBus},
};

/// Badge counts straight from the rows.
pub async fn load_unread_counts(
    db_client: &dyn Store,
    viewer: Viewer,
) -> Result<UnreadCounts, sqlx::Error> {
    let messages = db_client.get_unread_message_count(viewer).await?;
    let notifications = db_client.get_unread_notification_count(viewer.id).await?;
    Ok(UnreadCounts::new(messages, notifications))
}

/// Recomputes and pushes an `unread_count` frame. Failures are logged and
/// swallowed: polling will catch the client up.
pub async fn push_unread_count(db_client: &dyn Store, event_bus: &EventBus, viewer: Viewer) {
    match load_unread_counts(db_client, viewer).await {
        Ok(counts) => {
            event_bus.publish(viewer.id, ServerFrame::UnreadCount(counts));
        }
        Err(e) => {
            tracing::warn!("Failed to compute unread counts for {}: {}", viewer.id, e);
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationService {
    db_client: Arc<dyn Store>,
    event_bus: EventBus,
}

impl NotificationService {
    pub fn new(db_client: Arc<dyn Store>, event_bus: EventBus) -> Self {
        Self {
            db_client,
            event_bus,
        }
    }

    async fn viewer_for(&self, user_id: Uuid) -> Option<Viewer> {
        match self.db_client.get_user(user_id).await {
            Ok(user) => user.as_ref().map(Viewer::from),
            Err(e) => {
                tracing::warn!("Failed to load user {}: {}", user_id, e);
                None
            }
        }
    }

    /// Stores the row, then pushes it and the recipient's new badge counts.
    pub async fn store_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, ServiceError> {
        let notification = self.db_client.create_notification(notification).await?;

        tracing::info!(
            "Notification {} ({}) stored for user {}",
            notification.id,
            notification.notification_type.to_str(),
            notification.user_id
        );

        self.event_bus.publish(
            notification.user_id,
            ServerFrame::Notification(notification.clone()),
        );
        if let Some(viewer) = self.viewer_for(notification.user_id).await {
            push_unread_count(self.db_client.as_ref(), &self.event_bus, viewer).await;
        }

        Ok(notification)
    }

    pub async fn notify_job_application(
        &self,
        job: &Job,
        application: &JobApplication,
    ) -> Result<Notification, ServiceError> {
        tracing::info!(
            "Provider {} applied to job {} (application {})",
            application.provider_id,
            job.id,
            application.id
        );

        self.store_notification(NewNotification {
            user_id: job.requester_id,
            job_id: Some(job.id),
            notification_type: NotificationType::JobApplication,
            title: "New application".to_string(),
            message: format!("A provider applied to your job: {}", job.title),
        })
        .await
    }

    pub async fn notify_application_selected(
        &self,
        job: &Job,
        application: &JobApplication,
    ) -> Result<Notification, ServiceError> {
        self.store_notification(NewNotification {
            user_id: application.provider_id,
            job_id: Some(job.id),
            notification_type: NotificationType::ApplicationSelected,
            title: "Application selected".to_string(),
            message: format!("You've been selected for: {}", job.title),
        })
        .await
    }

    pub async fn notify_application_rejected(
        &self,
        job: &Job,
        application: &JobApplication,
    ) -> Result<Notification, ServiceError> {
        self.store_notification(NewNotification {
            user_id: application.provider_id,
            job_id: Some(job.id),
            notification_type: NotificationType::ApplicationRejected,
            title: "Application not selected".to_string(),
            message: format!("Another provider was assigned to: {}", job.title),
        })
        .await
    }

    pub async fn notify_job_accepted(&self, job: &Job) -> Result<Notification, ServiceError> {
        self.store_notification(NewNotification {
            user_id: job.requester_id,
            job_id: Some(job.id),
            notification_type: NotificationType::JobAccepted,
            title: "Job accepted".to_string(),
            message: format!("A provider accepted your job: {}", job.title),
        })
        .await
    }

    pub async fn notify_status_changed(
        &self,
        job: &Job,
        status: JobStatus,
    ) -> Result<Notification, ServiceError> {
        self.store_notification(NewNotification {
            user_id: job.requester_id,
            job_id: Some(job.id),
            notification_type: NotificationType::JobStatusChanged,
            title: "Job update".to_string(),
            message: format!("{} is now {}", job.title, status.to_str()),
        })
        .await
    }

    /// `None` when nobody was assigned yet.
    pub async fn notify_job_cancelled(
        &self,
        job: &Job,
    ) -> Result<Option<Notification>, ServiceError> {
        let Some(provider_id) = job.provider_id else {
            return Ok(None);
        };

        self.store_notification(NewNotification {
            user_id: provider_id,
            job_id: Some(job.id),
            notification_type: NotificationType::JobCancelled,
            title: "Job cancelled".to_string(),
            message: format!("The requester cancelled: {}", job.title),
        })
        .await
        .map(Some)
    }

    /// A pending applicant of a job that was cancelled before anyone was
    /// picked.
    pub async fn notify_application_closed(
        &self,
        job: &Job,
        application: &JobApplication,
    ) -> Result<Notification, ServiceError> {
        self.store_notification(NewNotification {
            user_id: application.provider_id,
            job_id: Some(job.id),
            notification_type: NotificationType::JobCancelled,
            title: "Job cancelled".to_string(),
            message: format!("The job you applied to was cancelled: {}", job.title),
        })
        .await
    }

    pub async fn get_user_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, ServiceError> {
        Ok(self
            .db_client
            .get_user_notifications(user_id, limit, offset)
            .await?)
    }

    pub async fn mark_notification_read(
        &self,
        viewer: Viewer,
        notification_id: Uuid,
    ) -> Result<Notification, ServiceError> {
        let notification = self
            .db_client
            .mark_notification_read(notification_id, viewer.id)
            .await?
            .ok_or(ServiceError::NotificationNotFound(notification_id))?;

        push_unread_count(self.db_client.as_ref(), &self.event_bus, viewer).await;
        Ok(notification)
    }

    pub async fn mark_all_read(&self, viewer: Viewer) -> Result<u64, ServiceError> {
        let changed = self.db_client.mark_all_notifications_read(viewer.id).await?;
        tracing::info!("Marked {} notifications read for {}", changed, viewer.id);

        push_unread_count(self.db_client.as_ref(), &self.event_bus, viewer).await;
        Ok(changed)
    }

    pub async fn get_unread_counts(&self, viewer: Viewer) -> Result<UnreadCounts, ServiceError> {
        Ok(load_unread_counts(self.db_client.as_ref(), viewer).await?)
    }
}
