use std::{sync::Arc, time::Duration};

use tokio::sync::Notify;

use super::{
    api::ApiClient,
    cache::{CacheKey, QueryCache},
    error::ClientError,
};

pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polling backstop for the realtime channel. Every tick refetches the
/// badge counts, the notification list and any stale watched key.
#[derive(Debug, Clone)]
pub struct NotificationFetcher {
    api: ApiClient,
    cache: Arc<QueryCache>,
    interval: Duration,
    wake: Arc<Notify>,
}

impl NotificationFetcher {
    pub fn new(api: ApiClient, cache: Arc<QueryCache>, interval: Duration, wake: Arc<Notify>) -> Self {
        Self {
            api,
            cache,
            interval: interval.max(MIN_POLL_INTERVAL),
            wake,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn keys_to_refresh(mut stale: Vec<CacheKey>) -> Vec<CacheKey> {
        let mut keys = vec![CacheKey::UnreadCount, CacheKey::Notifications];
        stale.retain(|key| !keys.contains(key));
        keys.append(&mut stale);
        keys
    }

    /// One pass. Transient failures are logged and the key stays stale;
    /// only a 401 is returned.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let keys = Self::keys_to_refresh(self.cache.stale_keys().await);

        for key in keys {
            let ticket = self.cache.begin_fetch(key).await;
            match self.api.fetch(&key).await {
                Ok(value) => {
                    self.cache.complete_fetch(ticket, value).await;
                }
                Err(ClientError::Unauthorized) => return Err(ClientError::Unauthorized),
                Err(e) => {
                    tracing::warn!("Refetch of {:?} failed: {}", key, e);
                }
            }
        }

        Ok(())
    }

    /// Polls until the server answers 401. A realtime frame can wake the
    /// loop early through the shared `Notify`.
    pub async fn run(&self) -> ClientError {
        loop {
            if let Err(e) = self.refresh().await {
                tracing::warn!("Polling stopped: {}", e);
                return e;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.wake.notified() => {
                    tracing::debug!("Poller woken early");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chatmodel::ThreadKey;

    #[test]
    fn interval_is_clamped() {
        let fetcher = NotificationFetcher::new(
            ApiClient::new("http://127.0.0.1:9", "token"),
            Arc::new(QueryCache::new()),
            Duration::from_millis(10),
            Arc::new(Notify::new()),
        );
        assert_eq!(fetcher.interval(), MIN_POLL_INTERVAL);
    }

    #[test]
    fn badge_keys_are_always_refreshed_once() {
        let thread = CacheKey::Thread(ThreadKey::Admin);
        let keys = NotificationFetcher::keys_to_refresh(vec![
            CacheKey::UnreadCount,
            thread,
            CacheKey::Conversations,
        ]);
        assert_eq!(
            keys,
            vec![
                CacheKey::UnreadCount,
                CacheKey::Notifications,
                thread,
                CacheKey::Conversations,
            ]
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_not_fatal() {
        let cache = Arc::new(QueryCache::new());
        let fetcher = NotificationFetcher::new(
            ApiClient::new("http://127.0.0.1:9", "token"),
            cache.clone(),
            Duration::from_secs(5),
            Arc::new(Notify::new()),
        );

        assert!(fetcher.refresh().await.is_ok());
        assert!(cache.is_stale(CacheKey::UnreadCount).await);
    }
}
