use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The server refused the token. Ends the session.
    #[error("Unauthorized")]
    Unauthorized,

    /// The realtime endpoint closed the socket on policy grounds.
    #[error("Realtime channel rejected: {0}")]
    Rejected(String),

    #[error("Request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Realtime error: {0}")]
    Realtime(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ClientError {
    /// Errors after which retrying with the same credentials is pointless.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClientError::Unauthorized | ClientError::Rejected(_))
    }
}
