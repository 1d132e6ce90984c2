// service/chat_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{ChatExt, JobExt, Store, UserExt},
    models::{
        chatmodel::*,
        jobmodel::Job,
        realtimemodel::ServerFrame,
        usermodel::{User, UserRole, UserSummary},
    },
    service::{
        conversation::aggregate_conversations,
        error::ServiceError,
        events::EventBus,
        notification_service::push_unread_count,
        permissions::{is_allowed, Action},
    },
};

#[derive(Debug, Clone)]
pub struct ChatService {
    db_client: Arc<dyn Store>,
    event_bus: EventBus,
}

impl ChatService {
    pub fn new(db_client: Arc<dyn Store>, event_bus: EventBus) -> Self {
        Self {
            db_client,
            event_bus,
        }
    }

    pub async fn send_message(
        &self,
        sender: &User,
        job_id: Option<Uuid>,
        receiver_id: Option<Uuid>,
        content: String,
    ) -> Result<Message, ServiceError> {
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(ServiceError::Validation(
                "Message content cannot be empty".to_string(),
            ));
        }

        let new_message = match job_id {
            Some(job_id) => self.job_message(sender, job_id, receiver_id, content).await?,
            None => self.admin_message(sender, receiver_id, content).await?,
        };

        let message = self.db_client.create_message(new_message).await?;
        tracing::info!(
            "Message {} sent by {} in thread {}",
            message.id,
            message.sender_id,
            message.thread_key()
        );

        self.deliver(&message).await;
        Ok(message)
    }

    async fn job_message(
        &self,
        sender: &User,
        job_id: Uuid,
        receiver_id: Option<Uuid>,
        content: String,
    ) -> Result<NewMessage, ServiceError> {
        let job = self.authorize_job_thread(sender, job_id).await?;

        let receiver = match receiver_id {
            Some(receiver) if receiver == sender.id => {
                return Err(ServiceError::Validation(
                    "You cannot message yourself".to_string(),
                ));
            }
            Some(receiver) => {
                let in_thread = job.is_participant(receiver)
                    || self.db_client.has_applied(job.id, receiver).await?;
                if !in_thread {
                    return Err(ServiceError::Validation(format!(
                        "User {} is not part of the thread for job {}",
                        receiver, job.id
                    )));
                }
                receiver
            }
            None if sender.id != job.requester_id => job.requester_id,
            None => job.provider_id.ok_or_else(|| {
                ServiceError::Validation(
                    "Job has no assigned provider yet; name the receiver".to_string(),
                )
            })?,
        };

        Ok(NewMessage {
            job_id: Some(job.id),
            sender_id: sender.id,
            receiver_id: Some(receiver),
            message_type: MessageType::JobMessage,
            content,
        })
    }

    /// Non-admins write to the shared admin inbox (or to one named admin);
    /// admins always reply to a specific user.
    async fn admin_message(
        &self,
        sender: &User,
        receiver_id: Option<Uuid>,
        content: String,
    ) -> Result<NewMessage, ServiceError> {
        let action = Action::SendAdminMessage;
        if !is_allowed(sender, &action) {
            return Err(ServiceError::PermissionDenied(sender.id, action.describe()));
        }

        let receiver_id = match receiver_id {
            Some(receiver) if receiver == sender.id => {
                return Err(ServiceError::Validation(
                    "You cannot message yourself".to_string(),
                ));
            }
            Some(receiver) => {
                let receiver_user = self
                    .db_client
                    .get_user(receiver)
                    .await?
                    .ok_or(ServiceError::UserNotFound(receiver))?;
                if !sender.is_admin() && !receiver_user.is_admin() {
                    return Err(ServiceError::Validation(
                        "Direct messages without a job can only go to the admin team".to_string(),
                    ));
                }
                Some(receiver)
            }
            None if sender.is_admin() => {
                return Err(ServiceError::Validation(
                    "Admins must name the receiver".to_string(),
                ));
            }
            None => None,
        };

        Ok(NewMessage {
            job_id: None,
            sender_id: sender.id,
            receiver_id,
            message_type: MessageType::AdminMessage,
            content,
        })
    }

    /// Posts a lifecycle update into the job thread.
    pub async fn post_system_message(
        &self,
        job: &Job,
        actor_id: Uuid,
        receiver_id: Uuid,
        content: String,
    ) -> Result<Message, ServiceError> {
        let message = self
            .db_client
            .create_message(NewMessage {
                job_id: Some(job.id),
                sender_id: actor_id,
                receiver_id: Some(receiver_id),
                message_type: MessageType::SystemNotification,
                content,
            })
            .await?;

        self.deliver(&message).await;
        Ok(message)
    }

    /// Pushes the message to its sender and readers, plus fresh badge counts
    /// for the readers.
    async fn deliver(&self, message: &Message) {
        self.event_bus
            .publish(message.sender_id, ServerFrame::Message(message.clone()));

        let readers: Vec<Viewer> = match message.receiver_id {
            Some(receiver) => match self.db_client.get_user(receiver).await {
                Ok(Some(user)) => vec![Viewer::from(&user)],
                Ok(None) => Vec::new(),
                Err(e) => {
                    tracing::warn!("Failed to load receiver {}: {}", receiver, e);
                    Vec::new()
                }
            },
            None => match self.db_client.get_admin_ids().await {
                Ok(ids) => ids
                    .into_iter()
                    .filter(|id| *id != message.sender_id)
                    .map(|id| Viewer::new(id, UserRole::Admin))
                    .collect(),
                Err(e) => {
                    tracing::warn!("Failed to load admin inbox recipients: {}", e);
                    Vec::new()
                }
            },
        };

        for reader in readers {
            if reader.id == message.sender_id {
                continue;
            }
            self.event_bus
                .publish(reader.id, ServerFrame::Message(message.clone()));
            push_unread_count(self.db_client.as_ref(), &self.event_bus, reader).await;
        }
    }

    async fn authorize_job_thread(&self, user: &User, job_id: Uuid) -> Result<Job, ServiceError> {
        let job = self
            .db_client
            .get_job_by_id(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))?;

        let has_applied = user.role == UserRole::Provider
            && !job.is_participant(user.id)
            && self.db_client.has_applied(job.id, user.id).await?;

        let action = Action::ViewJobThread {
            job: &job,
            has_applied,
        };
        if !is_allowed(user, &action) {
            return Err(ServiceError::PermissionDenied(user.id, action.describe()));
        }

        Ok(job)
    }

    async fn authorize_thread(&self, user: &User, thread: ThreadKey) -> Result<(), ServiceError> {
        match thread {
            ThreadKey::Job(job_id) => self.authorize_job_thread(user, job_id).await.map(|_| ()),
            ThreadKey::Admin => {
                let action = Action::SendAdminMessage;
                if is_allowed(user, &action) {
                    Ok(())
                } else {
                    Err(ServiceError::PermissionDenied(user.id, action.describe()))
                }
            }
        }
    }

    pub async fn get_conversations(
        &self,
        user: &User,
    ) -> Result<Vec<ConversationWithDetails>, ServiceError> {
        let viewer = Viewer::from(user);
        let messages = self.db_client.get_user_messages(viewer).await?;

        let mut job_ids: Vec<Uuid> = messages.iter().filter_map(|m| m.job_id).collect();
        job_ids.sort();
        job_ids.dedup();
        let jobs = self.db_client.get_jobs_by_ids(&job_ids).await?;

        let conversations = aggregate_conversations(&messages, &jobs, &viewer);

        let mut user_ids: Vec<Uuid> = conversations
            .iter()
            .filter_map(|c| c.other_user_id)
            .collect();
        user_ids.sort();
        user_ids.dedup();
        let users = self.db_client.get_users_by_ids(&user_ids).await?;

        Ok(conversations
            .into_iter()
            .map(|conversation| {
                let other_user = conversation.other_user_id.and_then(|id| {
                    users
                        .iter()
                        .find(|u| u.id == id)
                        .map(UserSummary::from)
                });
                ConversationWithDetails {
                    conversation,
                    other_user,
                }
            })
            .collect())
    }

    pub async fn get_thread_messages(
        &self,
        user: &User,
        thread: ThreadKey,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, ServiceError> {
        self.authorize_thread(user, thread).await?;
        Ok(self
            .db_client
            .get_thread_messages(thread, Viewer::from(user), limit, offset)
            .await?)
    }

    /// Marks everything in the thread addressed to `user` as read and pushes
    /// the new badge counts. Returns the rows changed; repeat calls return 0.
    pub async fn mark_thread_read(
        &self,
        user: &User,
        thread: ThreadKey,
    ) -> Result<u64, ServiceError> {
        self.authorize_thread(user, thread).await?;

        let viewer = Viewer::from(user);
        let changed = self.db_client.mark_thread_read(thread, viewer).await?;
        tracing::info!(
            "Marked {} messages read in thread {} for {}",
            changed,
            thread,
            user.id
        );

        push_unread_count(self.db_client.as_ref(), &self.event_bus, viewer).await;
        Ok(changed)
    }
}
