// models/realtimemodel.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    chatmodel::Message,
    notificationmodel::{Notification, UnreadCounts},
    usermodel::UserRole,
};

/// Frames the client sends. The first frame on every connection must be `auth`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Auth {
        #[serde(rename = "userId", alias = "user_id")]
        user_id: Uuid,
        #[serde(rename = "userRole", alias = "user_role")]
        user_role: UserRole,
    },
}

/// Frames pushed by the server. Best-effort: no ack, ordering or replay.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerFrame {
    Message(Message),
    Notification(Notification),
    UnreadCount(UnreadCounts),
}

impl ServerFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerFrame::Message(_) => "message",
            ServerFrame::Notification(_) => "notification",
            ServerFrame::UnreadCount(_) => "unread_count",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_frame_accepts_camel_case_wire_shape() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"auth","userId":"{}","userRole":"provider"}}"#, id);
        let frame: ClientFrame = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Auth {
                user_id: id,
                user_role: UserRole::Provider
            }
        );
    }

    #[test]
    fn server_frame_carries_type_and_payload() {
        let frame = ServerFrame::UnreadCount(UnreadCounts::new(2, 3));
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "unread_count");
        assert_eq!(value["payload"]["total"], 5);
    }
}
