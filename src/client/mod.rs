//! Client side of the delivery core: one realtime channel, a polling
//! backstop and a query cache that both of them keep fresh.
pub mod api;
pub mod cache;
pub mod error;
pub mod poller;
pub mod realtime;
pub mod session;

pub use api::ApiClient;
pub use cache::{CacheKey, QueryCache};
pub use error::ClientError;
pub use session::{Session, SessionEnd};
