use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{IdentityStore, NewUser, Session, SessionStore, StoreError, UserAccount};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, UserAccount>,
    // lower-cased username -> id
    usernames: HashMap<String, Uuid>,
    sessions: HashMap<Uuid, Session>,
}

/// Process-local store used when no database is configured, and by tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }

    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    #[cfg(test)]
    pub async fn sessions_for(&self, user_id: Uuid) -> Vec<Session> {
        self.inner
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn username_taken(&self, username: &str) -> Result<bool, StoreError> {
        let key = username.to_lowercase();
        Ok(self.inner.read().await.usernames.contains_key(&key))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserAccount>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .usernames
            .get(&username.to_lowercase())
            .and_then(|id| inner.users.get(id))
            .filter(|u| u.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<UserAccount, StoreError> {
        let key = user.username.to_lowercase();
        let mut inner = self.inner.write().await;
        if inner.usernames.contains_key(&key) {
            return Err(StoreError::Conflict { field: "username" });
        }

        let account = UserAccount {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.usernames.insert(key, account.id);
        inner.users.insert(account.id, account.clone());
        Ok(account)
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(user) = inner.users.remove(&id) {
            inner.usernames.remove(&user.username.to_lowercase());
            inner.sessions.retain(|_, s| s.user_id != id);
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<Session, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "session references unknown user {user_id}"
            )));
        }
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            created_at: OffsetDateTime::now_utc(),
            expires_at,
        };
        inner.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.inner.read().await.sessions.get(&id).cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), StoreError> {
        self.inner.write().await.sessions.remove(&id);
        Ok(())
    }
}
