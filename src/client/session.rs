use std::sync::Arc;

use tokio::sync::Notify;

use super::{
    api::ApiClient,
    cache::{CacheKey, QueryCache},
    error::ClientError,
    poller::NotificationFetcher,
    realtime::RealtimeChannel,
};
use crate::{
    config::ClientConfig,
    models::chatmodel::{Message, ThreadKey},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The token was refused; the cache has been cleared.
    Unauthorized,
    Rejected(String),
}

impl From<ClientError> for SessionEnd {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Rejected(reason) => SessionEnd::Rejected(reason),
            _ => SessionEnd::Unauthorized,
        }
    }
}

/// A signed-in client: realtime channel plus polling backstop over one
/// shared cache.
#[derive(Debug)]
pub struct Session {
    api: ApiClient,
    cache: Arc<QueryCache>,
    fetcher: NotificationFetcher,
    channel: RealtimeChannel,
    wake: Arc<Notify>,
}

impl Session {
    pub fn new(config: &ClientConfig) -> Self {
        let api = ApiClient::new(config.api_url.clone(), config.token.clone());
        let cache = Arc::new(QueryCache::new());
        let wake = Arc::new(Notify::new());
        let fetcher =
            NotificationFetcher::new(api.clone(), cache.clone(), config.poll_interval, wake.clone());

        Self {
            api,
            cache,
            fetcher,
            channel: RealtimeChannel::new(config),
            wake,
        }
    }

    pub fn cache(&self) -> Arc<QueryCache> {
        self.cache.clone()
    }

    async fn end_on_unauthorized<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(ClientError::Unauthorized) = &result {
            self.cache.clear().await;
        }
        result
    }

    /// Loads a thread into the cache and keeps it tracked from then on.
    pub async fn open_thread(&self, thread: ThreadKey) -> Result<Vec<Message>, ClientError> {
        let key = CacheKey::Thread(thread);
        self.cache.watch(key).await;

        let ticket = self.cache.begin_fetch(key).await;
        let messages = self
            .end_on_unauthorized(self.api.thread_messages(thread).await)
            .await?;
        self.cache
            .complete_fetch(ticket, serde_json::to_value(&messages)?)
            .await;
        Ok(messages)
    }

    pub async fn mark_thread_read(&self, thread: ThreadKey) -> Result<u64, ClientError> {
        let updated = self
            .end_on_unauthorized(self.api.mark_thread_read(thread).await)
            .await?;
        self.cache.on_thread_read(thread).await;
        self.wake.notify_one();
        Ok(updated)
    }

    /// Runs until the server refuses the token or rejects the channel.
    pub async fn run(&self) -> SessionEnd {
        self.cache.watch(CacheKey::UnreadCount).await;
        self.cache.watch(CacheKey::Notifications).await;
        self.cache.watch(CacheKey::Conversations).await;

        let error = tokio::select! {
            error = self.fetcher.run() => error,
            error = self.channel.run(&self.cache, &self.wake) => error,
        };

        tracing::warn!("Session ended: {}", error);
        self.cache.clear().await;
        SessionEnd::from(error)
    }
}
