// models/chatmodel.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::usermodel::{User, UserRole, UserSummary};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "message_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    JobMessage,
    AdminMessage,
    SystemNotification,
}

/// Sentinel used in URLs and cache keys for the admin-direct thread.
pub const ADMIN_THREAD_KEY: &str = "admin-messages";

/// A conversation is keyed by its job, or by the single admin-direct thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ThreadKey {
    Job(Uuid),
    Admin,
}

impl ThreadKey {
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            ThreadKey::Job(id) => Some(*id),
            ThreadKey::Admin => None,
        }
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadKey::Job(id) => write!(f, "{}", id),
            ThreadKey::Admin => f.write_str(ADMIN_THREAD_KEY),
        }
    }
}

impl FromStr for ThreadKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ADMIN_THREAD_KEY {
            return Ok(ThreadKey::Admin);
        }
        Uuid::parse_str(s)
            .map(ThreadKey::Job)
            .map_err(|_| format!("'{}' is neither a job id nor '{}'", s, ADMIN_THREAD_KEY))
    }
}

impl From<ThreadKey> for String {
    fn from(key: ThreadKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for ThreadKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Who is looking at a thread. Admins also read the shared admin inbox
/// (admin-direct messages with no receiver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub id: Uuid,
    pub role: UserRole,
}

impl Viewer {
    pub fn new(id: Uuid, role: UserRole) -> Self {
        Viewer { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<&User> for Viewer {
    fn from(user: &User) -> Self {
        Viewer::new(user.id, user.role)
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    /// Insertion order; breaks ties between equal `created_at` values.
    pub seq: i64,
    pub job_id: Option<Uuid>,
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub message_type: MessageType,
    pub content: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn thread_key(&self) -> ThreadKey {
        match self.job_id {
            Some(job_id) => ThreadKey::Job(job_id),
            None => ThreadKey::Admin,
        }
    }

    /// True when `viewer` is the reader this message waits on. Own messages
    /// are never addressed to their sender.
    pub fn is_addressed_to(&self, viewer: &Viewer) -> bool {
        if self.sender_id == viewer.id {
            return false;
        }
        match self.receiver_id {
            Some(receiver) => receiver == viewer.id,
            None => viewer.is_admin(),
        }
    }

    pub fn is_unread_for(&self, viewer: &Viewer) -> bool {
        !self.is_read && self.is_addressed_to(viewer)
    }

    /// The party on the other side of this message from `viewer`'s point of view.
    pub fn counterpart_of(&self, viewer_id: Uuid) -> Option<Uuid> {
        if self.sender_id == viewer_id {
            self.receiver_id
        } else {
            Some(self.sender_id)
        }
    }

    /// Ordering key for "most recent" comparisons.
    pub fn recency(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.seq)
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub job_id: Option<Uuid>,
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub message_type: MessageType,
    pub content: String,
}

/// Derived view of one thread for the conversation list. Never persisted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Conversation {
    pub thread_key: ThreadKey,
    pub job_id: Option<Uuid>,
    pub job_title: Option<String>,
    pub other_user_id: Option<Uuid>,
    pub last_message: Message,
    pub last_message_time: DateTime<Utc>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConversationWithDetails {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other_user: Option<UserSummary>,
}
