use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{watch, Mutex};

use crate::models::{
    chatmodel::ThreadKey, notificationmodel::UnreadCounts, realtimemodel::ServerFrame,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    UnreadCount,
    Notifications,
    Conversations,
    Thread(ThreadKey),
}

impl CacheKey {
    /// REST path serving this key.
    pub fn path(&self) -> String {
        match self {
            CacheKey::UnreadCount => "/api/unread-count".to_string(),
            CacheKey::Notifications => "/api/notifications".to_string(),
            CacheKey::Conversations => "/api/messages/conversations".to_string(),
            CacheKey::Thread(thread) => format!("/api/messages/threads/{}", thread),
        }
    }
}

/// Handed out by [`QueryCache::begin_fetch`]. A response is only applied if
/// no later-issued fetch for the same key landed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    key: CacheKey,
    issued: u64,
}

#[derive(Debug, Default)]
struct Entry {
    value: Option<Value>,
    applied: u64,
    invalidated: u64,
}

impl Entry {
    fn is_stale(&self) -> bool {
        self.value.is_none() || self.invalidated > self.applied
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, Entry>,
    clock: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn invalidate(&mut self, key: CacheKey) {
        let now = self.tick();
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.invalidated = now;
        }
    }

    fn invalidate_threads(&mut self) {
        let now = self.tick();
        for (key, entry) in self.entries.iter_mut() {
            if matches!(key, CacheKey::Thread(_)) {
                entry.invalidated = now;
            }
        }
    }
}

/// Keyed client-side cache. Only watched keys are tracked; invalidating an
/// unwatched key is a no-op.
#[derive(Debug)]
pub struct QueryCache {
    state: Mutex<CacheState>,
    unread: watch::Sender<Option<UnreadCounts>>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (unread, _) = watch::channel(None);
        Self {
            state: Mutex::new(CacheState::default()),
            unread,
        }
    }

    /// Badge counts as they land in the cache.
    pub fn subscribe_unread(&self) -> watch::Receiver<Option<UnreadCounts>> {
        self.unread.subscribe()
    }

    pub async fn watch(&self, key: CacheKey) {
        self.state.lock().await.entries.entry(key).or_default();
    }

    pub async fn get(&self, key: CacheKey) -> Option<Value> {
        let state = self.state.lock().await;
        state.entries.get(&key).and_then(|entry| entry.value.clone())
    }

    pub async fn get_as<T: DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Cached value for {:?} has an unexpected shape: {}", key, e);
                None
            }
        }
    }

    pub async fn is_stale(&self, key: CacheKey) -> bool {
        let state = self.state.lock().await;
        state.entries.get(&key).map_or(true, Entry::is_stale)
    }

    /// Watched keys whose value is missing or was invalidated since the
    /// last applied response.
    pub async fn stale_keys(&self) -> Vec<CacheKey> {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_stale())
            .map(|(key, _)| *key)
            .collect()
    }

    pub async fn begin_fetch(&self, key: CacheKey) -> FetchTicket {
        let mut state = self.state.lock().await;
        let issued = state.tick();
        state.entries.entry(key).or_default();
        FetchTicket { key, issued }
    }

    /// Applies a fetched value. Returns `false` when a newer response for
    /// the key was already applied and this one is dropped.
    pub async fn complete_fetch(&self, ticket: FetchTicket, value: Value) -> bool {
        let mut state = self.state.lock().await;
        let entry = state.entries.entry(ticket.key).or_default();
        if ticket.issued <= entry.applied {
            tracing::debug!("Dropping superseded response for {:?}", ticket.key);
            return false;
        }

        if ticket.key == CacheKey::UnreadCount {
            match serde_json::from_value::<UnreadCounts>(value.clone()) {
                Ok(counts) => {
                    self.unread.send_replace(Some(counts));
                }
                Err(e) => tracing::warn!("Unread count payload rejected: {}", e),
            }
        }

        entry.value = Some(value);
        entry.applied = ticket.issued;
        true
    }

    pub async fn mark_stale(&self, key: CacheKey) {
        self.state.lock().await.invalidate(key);
    }

    /// After this client marks a thread read.
    pub async fn on_thread_read(&self, thread: ThreadKey) {
        let mut state = self.state.lock().await;
        state.invalidate(CacheKey::Thread(thread));
        state.invalidate(CacheKey::Conversations);
        state.invalidate(CacheKey::UnreadCount);
    }

    /// Folds a realtime frame into the cache.
    pub async fn apply_frame(&self, frame: &ServerFrame) {
        match frame {
            ServerFrame::Message(message) => {
                let mut state = self.state.lock().await;
                state.invalidate(CacheKey::Thread(message.thread_key()));
                state.invalidate(CacheKey::Conversations);
                state.invalidate(CacheKey::UnreadCount);
            }
            ServerFrame::Notification(_) => {
                let mut state = self.state.lock().await;
                state.invalidate(CacheKey::Notifications);
                state.invalidate(CacheKey::UnreadCount);
            }
            ServerFrame::UnreadCount(counts) => {
                // The pushed counts are shown right away. The frame does not
                // say which thread changed, so every thread is refetched.
                let ticket = self.begin_fetch(CacheKey::UnreadCount).await;
                if let Ok(value) = serde_json::to_value(counts) {
                    self.complete_fetch(ticket, value).await;
                }
                let mut state = self.state.lock().await;
                state.invalidate(CacheKey::Conversations);
                state.invalidate_threads();
            }
        }
    }

    /// Drops everything. Used when the session ends on a 401.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        self.unread.send_replace(None);
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }
}
