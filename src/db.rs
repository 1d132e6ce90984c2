// db.rs
use std::fmt::Debug;

use sqlx::{Pool, Postgres};

pub mod chatdb;
pub mod jobdb;
#[cfg(test)]
pub mod memorydb;
pub mod notificationdb;
pub mod userdb;

pub use chatdb::ChatExt;
pub use jobdb::JobExt;
pub use notificationdb::NotificationExt;
pub use userdb::UserExt;

#[derive(Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
}

impl Debug for DBClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DBClient")
            .field("pool", &"Pool<Postgres>")
            .field("size", &self.pool.size())
            .finish()
    }
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }
}

/// Everything the services need from persistence. Implemented by
/// [`DBClient`] and, in tests, by the in-memory store.
pub trait Store: UserExt + JobExt + ChatExt + NotificationExt + Debug + Send + Sync {}

impl<T> Store for T where T: UserExt + JobExt + ChatExt + NotificationExt + Debug + Send + Sync {}
