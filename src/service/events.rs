// service/events.rs
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::models::realtimemodel::ServerFrame;

#[derive(Debug, Clone)]
pub struct Delivery {
    pub recipient: Uuid,
    pub frame: ServerFrame,
}

/// In-process fan-out of realtime frames. Every websocket session holds one
/// [`Subscription`]; publishers never wait on slow subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Delivery>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many live subscriptions the frame was handed to. Zero is
    /// normal when nobody is connected.
    pub fn publish(&self, recipient: Uuid, frame: ServerFrame) -> usize {
        tracing::debug!("Publishing {} frame to {}", frame.kind(), recipient);
        self.sender
            .send(Delivery { recipient, frame })
            .unwrap_or(0)
    }

    pub fn subscribe(&self, user_id: Uuid) -> Subscription {
        Subscription {
            user_id,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[derive(Debug)]
pub struct Subscription {
    user_id: Uuid,
    receiver: broadcast::Receiver<Delivery>,
}

impl Subscription {
    /// Next frame addressed to this subscriber. `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<ServerFrame> {
        loop {
            match self.receiver.recv().await {
                Ok(delivery) if delivery.recipient == self.user_id => return Some(delivery.frame),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Realtime subscriber {} lagged, {} frames dropped",
                        self.user_id,
                        skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
