// handler/realtime.rs
use std::sync::Arc;

use axum::{
    extract::ws::{close_code, CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};

use crate::{
    middleware::JWTAuthMiddeware,
    models::{
        chatmodel::Viewer,
        realtimemodel::{ClientFrame, ServerFrame},
        usermodel::User,
    },
    service::notification_service::load_unread_counts,
    AppState,
};

pub fn realtime_handler() -> Router {
    Router::new().route("/", get(realtime_upgrade))
}

pub async fn realtime_upgrade(
    ws: WebSocketUpgrade,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, auth.user))
}

#[derive(Debug, PartialEq)]
enum AuthOutcome {
    Accepted,
    Rejected(&'static str),
}

/// The socket is already authenticated by the token; the `auth` frame has to
/// name the same user.
fn check_auth_frame(raw: &str, user: &User) -> AuthOutcome {
    match serde_json::from_str::<ClientFrame>(raw) {
        Ok(ClientFrame::Auth { user_id, user_role }) if user_id == user.id => {
            if user_role != user.role {
                tracing::debug!(
                    "Auth frame for {} claims role {}, using stored role {}",
                    user.id,
                    user_role.to_str(),
                    user.role.to_str()
                );
            }
            AuthOutcome::Accepted
        }
        Ok(ClientFrame::Auth { .. }) => AuthOutcome::Rejected("auth frame does not match token"),
        Err(_) => AuthOutcome::Rejected("first frame must be auth"),
    }
}

async fn wait_for_auth(receiver: &mut SplitStream<WebSocket>, user: &User) -> AuthOutcome {
    while let Some(incoming) = receiver.next().await {
        match incoming {
            Ok(WsMessage::Text(text)) => return check_auth_frame(&text, user),
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => continue,
            Ok(WsMessage::Close(_)) | Err(_) => break,
            Ok(WsMessage::Binary(_)) => return AuthOutcome::Rejected("first frame must be auth"),
        }
    }
    AuthOutcome::Rejected("connection closed before auth")
}

async fn send_frame(
    sender: &mut SplitSink<WebSocket, WsMessage>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(json) => sender.send(WsMessage::Text(json.into())).await,
        Err(e) => {
            tracing::error!("Failed to serialize {} frame: {}", frame.kind(), e);
            Ok(())
        }
    }
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user: User) {
    let (mut sender, mut receiver) = socket.split();

    let outcome = match tokio::time::timeout(
        app_state.env.realtime_auth_timeout,
        wait_for_auth(&mut receiver, &user),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(_) => AuthOutcome::Rejected("auth timeout"),
    };

    if let AuthOutcome::Rejected(reason) = outcome {
        tracing::info!("Closing realtime socket for {}: {}", user.id, reason);
        let _ = sender
            .send(WsMessage::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: reason.into(),
            })))
            .await;
        return;
    }

    // Subscribe before the initial count so nothing published in between is lost.
    let mut subscription = app_state.event_bus.subscribe(user.id);
    let viewer = Viewer::from(&user);
    tracing::info!("Realtime channel open for {}", user.id);

    match load_unread_counts(app_state.db_client.as_ref(), viewer).await {
        Ok(counts) => {
            if send_frame(&mut sender, &ServerFrame::UnreadCount(counts))
                .await
                .is_err()
            {
                return;
            }
        }
        Err(e) => tracing::warn!("Failed to load initial unread counts for {}: {}", user.id, e),
    }

    loop {
        tokio::select! {
            frame = subscription.next() => {
                let Some(frame) = frame else { break };
                tracing::debug!("Pushing {} frame to {}", frame.kind(), user.id);
                if let Err(e) = send_frame(&mut sender, &frame).await {
                    tracing::debug!("Realtime send to {} failed: {}", user.id, e);
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(WsMessage::Text(text))) => {
                        tracing::debug!("Ignoring client frame from {}: {}", user.id, text.as_str());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!("Realtime receive from {} failed: {}", user.id, e);
                        break;
                    }
                }
            }
        }
    }

    tracing::info!("Realtime channel closed for {}", user.id);
}
