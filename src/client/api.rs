use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{cache::CacheKey, error::ClientError};
use crate::models::chatmodel::{Message, ThreadKey};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct FailBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ReadReceipt {
    updated: u64,
}

/// Thin REST client over the `{"status","data"}` envelope.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            let message = match response.json::<FailBody>().await {
                Ok(body) => body.message,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
            };
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&body)?;
        Ok(envelope.data)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, ClientError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Self::read(response).await
    }

    /// Raw `data` for a cache key.
    pub async fn fetch(&self, key: &CacheKey) -> Result<Value, ClientError> {
        self.get(&key.path()).await
    }

    pub async fn thread_messages(&self, thread: ThreadKey) -> Result<Vec<Message>, ClientError> {
        self.get(&CacheKey::Thread(thread).path()).await
    }

    pub async fn mark_thread_read(&self, thread: ThreadKey) -> Result<u64, ClientError> {
        let receipt: ReadReceipt = self
            .post(&format!("/api/messages/threads/{}/read", thread), json!({}))
            .await?;
        Ok(receipt.updated)
    }

    pub async fn send_message(
        &self,
        job_id: Option<Uuid>,
        receiver_id: Option<Uuid>,
        content: &str,
    ) -> Result<Message, ClientError> {
        self.post(
            "/api/messages",
            json!({
                "job_id": job_id,
                "receiver_id": receiver_id,
                "content": content,
            }),
        )
        .await
    }
}
