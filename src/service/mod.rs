pub mod chat_service;
pub mod conversation;
pub mod error;
pub mod events;
pub mod job_service;
pub mod notification_service;
pub mod permissions;
