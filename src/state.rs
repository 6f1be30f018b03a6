use std::sync::Arc;

use crate::accounts::creator::AccountCreator;
use crate::accounts::password::PasswordPolicy;
use crate::accounts::session::{SessionKeys, SessionManager};
use crate::accounts::validator::RegistrationValidator;
use crate::config::AppConfig;
use crate::store::{IdentityStore, MemoryStore, PgStore, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub identity: Arc<dyn IdentityStore>,
    pub sessions: Arc<dyn SessionStore>,
    /// Built once from `config.session` and shared by every request.
    pub keys: SessionKeys,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let Some(url) = config.database_url.as_deref() else {
            tracing::warn!("DATABASE_URL not set; accounts are kept in memory and lost on restart");
            let store = Arc::new(MemoryStore::new());
            return Self::from_parts(config, store.clone(), store);
        };

        let store = Arc::new(PgStore::connect(url).await?);

        // Run migrations if present
        if let Err(e) = sqlx::migrate!("./migrations").run(store.pool()).await {
            tracing::warn!(error = %e, "migrations folder not found or migration failed; continuing");
        }

        Self::from_parts(config, store.clone(), store)
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        identity: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> anyhow::Result<Self> {
        let keys = SessionKeys::from_config(&config.session)?;
        Ok(Self {
            config,
            identity,
            sessions,
            keys,
        })
    }

    /// State over a fresh memory store, returned alongside it for inspection.
    #[cfg(test)]
    pub fn in_memory(config: AppConfig) -> (Self, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = Self::from_parts(Arc::new(config), store.clone(), store.clone())
            .expect("test config is valid");
        (state, store)
    }

    pub fn validator(&self) -> RegistrationValidator {
        RegistrationValidator::new(
            self.identity.clone(),
            PasswordPolicy::new(&self.config.password),
        )
    }

    pub fn session_manager(&self) -> SessionManager {
        SessionManager::new(self.sessions.clone(), self.keys.clone())
    }

    pub fn account_creator(&self) -> AccountCreator {
        AccountCreator::new(self.identity.clone(), self.session_manager())
    }
}
