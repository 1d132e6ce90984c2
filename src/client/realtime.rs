use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::Notify;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::AUTHORIZATION, HeaderValue, StatusCode},
        protocol::frame::coding::CloseCode,
        Error as WsError, Message as WsMessage,
    },
};
use uuid::Uuid;

use super::{cache::QueryCache, error::ClientError};
use crate::{
    config::ClientConfig,
    models::{
        realtimemodel::{ClientFrame, ServerFrame},
        usermodel::UserRole,
    },
};

/// Exponential backoff with equal jitter: half the capped delay is fixed,
/// the other half scales with `jitter` in `[0, 1]`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration, jitter: f64) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(16));
    let capped = base.saturating_mul(factor).min(max);
    let half = capped / 2;
    half + half.mul_f64(jitter.clamp(0.0, 1.0))
}

#[derive(Debug, Clone)]
pub struct RealtimeChannel {
    url: String,
    token: String,
    user_id: Uuid,
    user_role: UserRole,
    reconnect_base: Duration,
    reconnect_max: Duration,
}

impl RealtimeChannel {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            url: config.realtime_url(),
            token: config.token.clone(),
            user_id: config.user_id,
            user_role: config.user_role,
            reconnect_base: config.reconnect_base,
            reconnect_max: config.reconnect_max,
        }
    }

    /// One connection: handshake, auth frame, then frames until the socket
    /// closes. `connected` flips once the auth frame is out.
    async fn connect_once(
        &self,
        cache: &QueryCache,
        wake: &Notify,
        connected: &mut bool,
    ) -> Result<(), ClientError> {
        let mut request = self.url.as_str().into_client_request()?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| ClientError::Unauthorized)?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (mut socket, _) = match connect_async(request).await {
            Ok(pair) => pair,
            Err(WsError::Http(response)) if response.status() == StatusCode::UNAUTHORIZED => {
                return Err(ClientError::Unauthorized);
            }
            Err(e) => return Err(e.into()),
        };

        let auth = serde_json::to_string(&ClientFrame::Auth {
            user_id: self.user_id,
            user_role: self.user_role,
        })?;
        socket.send(WsMessage::Text(auth.into())).await?;
        *connected = true;
        tracing::info!("Realtime channel connected for {}", self.user_id);

        while let Some(incoming) = socket.next().await {
            match incoming? {
                WsMessage::Text(text) => match serde_json::from_str::<ServerFrame>(text.as_str()) {
                    Ok(frame) => {
                        tracing::debug!("Received {} frame", frame.kind());
                        cache.apply_frame(&frame).await;
                        wake.notify_one();
                    }
                    Err(e) => tracing::warn!("Ignoring malformed frame: {}", e),
                },
                WsMessage::Close(Some(close)) if close.code == CloseCode::Policy => {
                    return Err(ClientError::Rejected(close.reason.as_str().to_string()));
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }

        Ok(())
    }

    /// Keeps the channel up, reconnecting with backoff. Returns only on a
    /// terminal error.
    pub async fn run(&self, cache: &QueryCache, wake: &Notify) -> ClientError {
        let mut attempt: u32 = 0;

        loop {
            let mut connected = false;
            let result = self.connect_once(cache, wake, &mut connected).await;
            if connected {
                attempt = 0;
            }

            match result {
                Err(e) if e.is_terminal() => {
                    tracing::warn!("Realtime channel closed for good: {}", e);
                    return e;
                }
                Err(e) => tracing::warn!("Realtime channel dropped: {}", e),
                Ok(()) => tracing::info!("Realtime channel closed by server"),
            }

            // Frames may have been missed while disconnected.
            wake.notify_one();

            let jitter: f64 = rand::rng().random();
            let delay = backoff_delay(attempt, self.reconnect_base, self.reconnect_max, jitter);
            attempt = attempt.saturating_add(1);
            tracing::debug!("Reconnecting in {:?} (attempt {})", delay, attempt);
            tokio::time::sleep(delay).await;
        }
    }
}
