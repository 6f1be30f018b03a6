use std::sync::Arc;

use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::accounts::dto::{ErrorSet, ValidatedRegistration, USERNAME};
use crate::accounts::errors::RegistrationError;
use crate::accounts::password::hash_password;
use crate::accounts::session::{IssuedSession, SessionManager};
use crate::accounts::validator::DUPLICATE_USERNAME;
use crate::store::{IdentityStore, NewUser, StoreError, UserAccount};

/// Result of a registration that also signed the new user in.
#[derive(Debug, Clone)]
pub struct Registered {
    pub account: UserAccount,
    pub session: IssuedSession,
}

pub struct AccountCreator {
    identity: Arc<dyn IdentityStore>,
    sessions: SessionManager,
}

impl AccountCreator {
    pub fn new(identity: Arc<dyn IdentityStore>, sessions: SessionManager) -> Self {
        Self { identity, sessions }
    }

    /// Hashes the password and inserts the account. Insertion is
    /// insert-if-absent, so a username claimed after validation surfaces as
    /// the same field error the validator would have produced.
    #[instrument(skip(self, data), fields(username = %data.username))]
    pub async fn create_account(
        &self,
        data: ValidatedRegistration,
    ) -> Result<UserAccount, RegistrationError> {
        let password_hash =
            hash_password(&data.password).map_err(|e| RegistrationError::Hashing(e.to_string()))?;

        let new_user = NewUser {
            username: data.username,
            email: data.email,
            password_hash,
        };

        match self.identity.insert_user(new_user).await {
            Ok(account) => {
                info!(user_id = %account.id, "account created");
                Ok(account)
            }
            Err(StoreError::Conflict { .. }) => {
                info!("username claimed between validation and insert");
                let mut errors = ErrorSet::new();
                errors.add(USERNAME, DUPLICATE_USERNAME);
                Err(RegistrationError::Invalid(errors))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Signs `user_id` in, replacing `previous` if the client had a session.
    pub async fn authenticate(
        &self,
        user_id: Uuid,
        previous: Option<Uuid>,
    ) -> Result<IssuedSession, RegistrationError> {
        Ok(self.sessions.start(user_id, previous).await?)
    }

    /// Creates the account and signs it in. Either both happen or neither:
    /// when the session cannot be established the new account is removed.
    pub async fn create_and_authenticate(
        &self,
        data: ValidatedRegistration,
        previous: Option<Uuid>,
    ) -> Result<Registered, RegistrationError> {
        let account = self.create_account(data).await?;

        match self.authenticate(account.id, previous).await {
            Ok(session) => Ok(Registered { account, session }),
            Err(e) => {
                error!(error = %e, user_id = %account.id, "session setup failed; rolling back account");
                if let Err(cleanup) = self.identity.delete_user(account.id).await {
                    error!(error = %cleanup, user_id = %account.id, "account rollback failed");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::password::verify_password;
    use crate::accounts::session::SessionKeys;
    use crate::config::AppConfig;
    use crate::store::failing::BrokenSessions;
    use crate::store::MemoryStore;

    fn data(username: &str) -> ValidatedRegistration {
        ValidatedRegistration {
            username: username.into(),
            email: format!("{username}@example.com"),
            password: "Str0ngPass!23".into(),
        }
    }

    fn keys() -> SessionKeys {
        SessionKeys::from_config(&AppConfig::for_tests().session).unwrap()
    }

    fn creator(store: Arc<MemoryStore>) -> AccountCreator {
        AccountCreator::new(store.clone(), SessionManager::new(store, keys()))
    }

    #[tokio::test]
    async fn creates_account_with_hashed_password_and_session() {
        let store = Arc::new(MemoryStore::new());
        let creator = creator(store.clone());

        let registered = creator
            .create_and_authenticate(data("alice"), None)
            .await
            .expect("registration");

        assert_eq!(registered.account.username, "alice");
        assert_eq!(registered.account.email, "alice@example.com");
        assert_ne!(registered.account.password_hash, "Str0ngPass!23");
        assert!(verify_password("Str0ngPass!23", &registered.account.password_hash).unwrap());
        assert_eq!(registered.session.session.user_id, registered.account.id);
        assert_eq!(store.user_count().await, 1);
        assert_eq!(store.sessions_for(registered.account.id).await.len(), 1);
    }

    #[tokio::test]
    async fn insert_conflict_becomes_field_error() {
        let store = Arc::new(MemoryStore::new());
        let creator = creator(store.clone());
        creator.create_account(data("alice")).await.unwrap();

        // Both passed validation before either was inserted.
        let err = creator.create_account(data("ALICE")).await.unwrap_err();
        match err {
            RegistrationError::Invalid(errors) => {
                assert_eq!(errors.get(USERNAME).unwrap(), [DUPLICATE_USERNAME]);
            }
            other => panic!("expected field error, got {other:?}"),
        }
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn account_is_removed_when_session_fails() {
        let store = Arc::new(MemoryStore::new());
        let creator = AccountCreator::new(
            store.clone(),
            SessionManager::new(Arc::new(BrokenSessions), keys()),
        );

        let err = creator
            .create_and_authenticate(data("bob"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Session(_)));
        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn create_account_alone_does_not_sign_in() {
        let store = Arc::new(MemoryStore::new());
        let creator = creator(store.clone());

        let account = creator.create_account(data("carol")).await.unwrap();
        assert_eq!(store.session_count().await, 0);

        let issued = creator.authenticate(account.id, None).await.unwrap();
        assert_eq!(issued.session.user_id, account.id);
        assert_eq!(store.session_count().await, 1);
    }
}
