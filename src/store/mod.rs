//! Persistence seams: users live behind [`IdentityStore`], sessions behind
//! [`SessionStore`]. Both are handed to the components that need them.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

#[cfg(test)]
pub mod failing;
pub mod memory;
pub mod postgres;
mod types;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use types::{NewUser, Session, UserAccount};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("{field} already exists")]
    Conflict { field: &'static str },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Case-insensitive existence check used for username uniqueness.
    async fn username_taken(&self, username: &str) -> Result<bool, StoreError>;

    /// Exact lookup used by login.
    async fn find_by_username(&self, username: &str) -> Result<Option<UserAccount>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, StoreError>;

    /// Insert-if-absent. A username that collides case-insensitively yields
    /// [`StoreError::Conflict`] and leaves the store untouched.
    async fn insert_user(&self, user: NewUser) -> Result<UserAccount, StoreError>;

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(
        &self,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<Session, StoreError>;

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, StoreError>;

    async fn delete_session(&self, id: Uuid) -> Result<(), StoreError>;
}
