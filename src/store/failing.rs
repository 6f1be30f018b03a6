//! Store doubles whose writes always fail.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Session, SessionStore, StoreError};

/// Session store that cannot create sessions.
pub struct BrokenSessions;

#[async_trait]
impl SessionStore for BrokenSessions {
    async fn create_session(
        &self,
        _user_id: Uuid,
        _expires_at: OffsetDateTime,
    ) -> Result<Session, StoreError> {
        Err(StoreError::Backend(anyhow::anyhow!("session table unavailable")))
    }

    async fn find_session(&self, _id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(None)
    }

    async fn delete_session(&self, _id: Uuid) -> Result<(), StoreError> {
        Ok(())
    }
}
