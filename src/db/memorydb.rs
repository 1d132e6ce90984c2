// db/memorydb.rs
//! In-process store with the same conditional-write semantics as the
//! PostgreSQL implementation. Every mutation runs under one write lock, which
//! gives the same first-writer-wins behaviour the SQL `WHERE` guards give.
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ChatExt, JobExt, NotificationExt, UserExt};
use crate::models::{
    chatmodel::*,
    jobmodel::*,
    notificationmodel::*,
    usermodel::{User, UserRole, UserStatus},
};

#[derive(Debug, Default)]
struct MemoryState {
    users: Vec<User>,
    jobs: Vec<Job>,
    applications: Vec<JobApplication>,
    messages: Vec<Message>,
    notifications: Vec<Notification>,
    next_seq: i64,
    offline: bool,
}

#[derive(Debug, Default)]
pub struct MemoryDB {
    state: RwLock<MemoryState>,
}

impl MemoryDB {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, name: &str, role: UserRole) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@jobtradesasa.test", name.to_lowercase().replace(' ', ".")),
            role,
            status: UserStatus::Active,
            is_verified: true,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };
        self.state.write().await.users.push(user.clone());
        user
    }

    pub async fn set_user_status(&self, user_id: Uuid, status: UserStatus) {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            user.status = status;
            user.updated_at = Utc::now();
        }
    }

    /// While offline, user lookups fail the way a dropped pool would.
    pub async fn set_offline(&self, offline: bool) {
        self.state.write().await.offline = offline;
    }
}

fn in_thread(message: &Message, thread: ThreadKey) -> bool {
    message.job_id == thread.job_id()
}

fn visible_to(message: &Message, viewer: &Viewer) -> bool {
    message.sender_id == viewer.id
        || message.receiver_id == Some(viewer.id)
        || (viewer.is_admin() && message.receiver_id.is_none() && message.job_id.is_none())
}

fn page<T: Clone>(items: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl UserExt for MemoryDB {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, Error> {
        let state = self.state.read().await;
        if state.offline {
            return Err(Error::PoolTimedOut);
        }
        Ok(state.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn get_users_by_ids(&self, user_ids: &[Uuid]) -> Result<Vec<User>, Error> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .filter(|u| user_ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn get_admin_ids(&self) -> Result<Vec<Uuid>, Error> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .filter(|u| u.is_admin() && u.is_active())
            .map(|u| u.id)
            .collect())
    }
}

#[async_trait]
impl JobExt for MemoryDB {
    async fn create_job(&self, requester_id: Uuid, job: NewJob) -> Result<Job, Error> {
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            requester_id,
            provider_id: None,
            title: job.title,
            description: job.description,
            category: job.category,
            location: job.location,
            budget: job.budget,
            status: JobStatus::Open,
            created_at: now,
            updated_at: now,
        };
        self.state.write().await.jobs.push(job.clone());
        Ok(job)
    }

    async fn get_job_by_id(&self, job_id: Uuid) -> Result<Option<Job>, Error> {
        let state = self.state.read().await;
        Ok(state.jobs.iter().find(|j| j.id == job_id).cloned())
    }

    async fn get_jobs_by_ids(&self, job_ids: &[Uuid]) -> Result<Vec<Job>, Error> {
        let state = self.state.read().await;
        Ok(state
            .jobs
            .iter()
            .filter(|j| job_ids.contains(&j.id))
            .cloned()
            .collect())
    }

    async fn get_open_jobs(&self, limit: i64, offset: i64) -> Result<Vec<Job>, Error> {
        let state = self.state.read().await;
        Ok(page(
            state
                .jobs
                .iter()
                .rev()
                .filter(|j| j.status == JobStatus::Open)
                .cloned(),
            limit,
            offset,
        ))
    }

    async fn accept_job(
        &self,
        job_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<JobResolution>, Error> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let Some(job) = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.is_open_for_assignment())
        else {
            return Ok(None);
        };
        job.provider_id = Some(provider_id);
        job.status = JobStatus::Accepted;
        job.updated_at = now;
        let job = job.clone();

        let mut rejected = Vec::new();
        for application in state
            .applications
            .iter_mut()
            .filter(|a| a.job_id == job_id && a.status == ApplicationStatus::Pending)
        {
            application.resolved_at = Some(now);
            if application.provider_id == provider_id {
                application.status = ApplicationStatus::Selected;
            } else {
                application.status = ApplicationStatus::Rejected;
                rejected.push(application.clone());
            }
        }

        Ok(Some(JobResolution { job, rejected }))
    }

    async fn cancel_job(
        &self,
        job_id: Uuid,
        expected: JobStatus,
    ) -> Result<Option<JobResolution>, Error> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let Some(job) = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status == expected)
        else {
            return Ok(None);
        };
        job.status = JobStatus::Cancelled;
        job.updated_at = now;
        let job = job.clone();

        let mut rejected = Vec::new();
        for application in state
            .applications
            .iter_mut()
            .filter(|a| a.job_id == job_id && a.status == ApplicationStatus::Pending)
        {
            application.status = ApplicationStatus::Rejected;
            application.resolved_at = Some(now);
            rejected.push(application.clone());
        }

        Ok(Some(JobResolution { job, rejected }))
    }

    async fn update_job_status(
        &self,
        job_id: Uuid,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<Option<Job>, Error> {
        let mut state = self.state.write().await;
        let Some(job) = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status == expected)
        else {
            return Ok(None);
        };
        job.status = next;
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn create_job_application(
        &self,
        job_id: Uuid,
        provider_id: Uuid,
        cover_letter: Option<String>,
        proposed_rate: Option<f64>,
    ) -> Result<Option<JobApplication>, Error> {
        let mut state = self.state.write().await;
        if state
            .applications
            .iter()
            .any(|a| a.job_id == job_id && a.provider_id == provider_id)
        {
            return Ok(None);
        }
        let application = JobApplication {
            id: Uuid::new_v4(),
            job_id,
            provider_id,
            cover_letter,
            proposed_rate,
            status: ApplicationStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        };
        state.applications.push(application.clone());
        Ok(Some(application))
    }

    async fn get_job_applications(&self, job_id: Uuid) -> Result<Vec<JobApplication>, Error> {
        let state = self.state.read().await;
        Ok(state
            .applications
            .iter()
            .filter(|a| a.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn get_job_application_by_id(
        &self,
        application_id: Uuid,
    ) -> Result<Option<JobApplication>, Error> {
        let state = self.state.read().await;
        Ok(state
            .applications
            .iter()
            .find(|a| a.id == application_id)
            .cloned())
    }

    async fn has_applied(&self, job_id: Uuid, provider_id: Uuid) -> Result<bool, Error> {
        let state = self.state.read().await;
        Ok(state
            .applications
            .iter()
            .any(|a| a.job_id == job_id && a.provider_id == provider_id))
    }

    async fn select_application(
        &self,
        job_id: Uuid,
        application_id: Uuid,
    ) -> Result<Option<ApplicationSelection>, Error> {
        let mut state = self.state.write().await;

        let job_open = state
            .jobs
            .iter()
            .any(|j| j.id == job_id && j.is_open_for_assignment());
        let selectable = state.applications.iter().any(|a| {
            a.id == application_id && a.job_id == job_id && a.status == ApplicationStatus::Pending
        });
        if !job_open || !selectable {
            return Ok(None);
        }

        let now = Utc::now();
        let mut selected = None;
        let mut rejected = Vec::new();
        for application in state
            .applications
            .iter_mut()
            .filter(|a| a.job_id == job_id && a.status == ApplicationStatus::Pending)
        {
            application.resolved_at = Some(now);
            if application.id == application_id {
                application.status = ApplicationStatus::Selected;
                selected = Some(application.clone());
            } else {
                application.status = ApplicationStatus::Rejected;
                rejected.push(application.clone());
            }
        }
        let Some(selected) = selected else {
            return Ok(None);
        };

        let Some(job) = state.jobs.iter_mut().find(|j| j.id == job_id) else {
            return Err(Error::RowNotFound);
        };
        job.provider_id = Some(selected.provider_id);
        job.status = JobStatus::Accepted;
        job.updated_at = now;

        Ok(Some(ApplicationSelection {
            job: job.clone(),
            selected,
            rejected,
        }))
    }
}

#[async_trait]
impl ChatExt for MemoryDB {
    async fn create_message(&self, message: NewMessage) -> Result<Message, Error> {
        let mut state = self.state.write().await;
        state.next_seq += 1;
        let message = Message {
            id: Uuid::new_v4(),
            seq: state.next_seq,
            job_id: message.job_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            message_type: message.message_type,
            content: message.content,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn get_user_messages(&self, viewer: Viewer) -> Result<Vec<Message>, Error> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .iter()
            .filter(|m| visible_to(m, &viewer))
            .cloned()
            .collect())
    }

    async fn get_thread_messages(
        &self,
        thread: ThreadKey,
        viewer: Viewer,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, Error> {
        let state = self.state.read().await;
        let mut recent = page(
            state
                .messages
                .iter()
                .rev()
                .filter(|m| in_thread(m, thread))
                .filter(|m| {
                    m.sender_id == viewer.id
                        || m.receiver_id == Some(viewer.id)
                        || (viewer.is_admin() && m.receiver_id.is_none())
                })
                .cloned(),
            limit,
            offset,
        );
        recent.reverse();
        Ok(recent)
    }

    async fn mark_thread_read(&self, thread: ThreadKey, viewer: Viewer) -> Result<u64, Error> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut changed = 0;
        for message in state
            .messages
            .iter_mut()
            .filter(|m| in_thread(m, thread) && m.is_unread_for(&viewer))
        {
            message.is_read = true;
            message.read_at = Some(now);
            changed += 1;
        }
        Ok(changed)
    }

    async fn get_unread_message_count(&self, viewer: Viewer) -> Result<i64, Error> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .iter()
            .filter(|m| m.is_unread_for(&viewer))
            .count() as i64)
    }
}

#[async_trait]
impl NotificationExt for MemoryDB {
    async fn create_notification(&self, notification: NewNotification) -> Result<Notification, Error> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            job_id: notification.job_id,
            notification_type: notification.notification_type,
            title: notification.title,
            message: notification.message,
            is_read: false,
            created_at: Utc::now(),
        };
        self.state.write().await.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn get_user_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, Error> {
        let state = self.state.read().await;
        Ok(page(
            state
                .notifications
                .iter()
                .rev()
                .filter(|n| n.user_id == user_id)
                .cloned(),
            limit,
            offset,
        ))
    }

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Notification>, Error> {
        let mut state = self.state.write().await;
        let Some(notification) = state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id)
        else {
            return Ok(None);
        };
        notification.is_read = true;
        Ok(Some(notification.clone()))
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<u64, Error> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for notification in state
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            notification.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn get_unread_notification_count(&self, user_id: Uuid) -> Result<i64, Error> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }
}
