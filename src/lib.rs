pub mod client;
pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;
pub mod utils;

use std::sync::Arc;

use config::Config;
use db::Store;
use service::{
    chat_service::ChatService, events::EventBus, job_service::JobService,
    notification_service::NotificationService,
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<dyn Store>,
    pub event_bus: EventBus,
    pub chat_service: Arc<ChatService>,
    pub notification_service: Arc<NotificationService>,
    pub job_service: Arc<JobService>,
}

impl AppState {
    pub fn new(env: Config, db_client: Arc<dyn Store>) -> Self {
        let event_bus = EventBus::new(env.event_bus_capacity);

        let chat_service = Arc::new(ChatService::new(db_client.clone(), event_bus.clone()));
        let notification_service = Arc::new(NotificationService::new(
            db_client.clone(),
            event_bus.clone(),
        ));
        let job_service = Arc::new(JobService::new(
            db_client.clone(),
            chat_service.clone(),
            notification_service.clone(),
        ));

        AppState {
            env,
            db_client,
            event_bus,
            chat_service,
            notification_service,
            job_service,
        }
    }
}
