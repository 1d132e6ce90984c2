pub mod chat;
pub mod jobs;
pub mod notification;
pub mod realtime;
