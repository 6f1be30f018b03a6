use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::accounts::errors::SessionError;
use crate::config::SessionConfig;
use crate::store::{Session, SessionStore};

/// Payload of the signed session credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // user ID
    pub sid: Uuid, // session ID
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

/// Signing and verification keys for session credentials, plus cookie policy.
#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

impl SessionKeys {
    pub fn from_config(cfg: &SessionConfig) -> anyhow::Result<Self> {
        cfg.validate()?;
        Ok(Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.ttl_minutes),
            cookie_name: cfg.cookie_name.clone(),
            cookie_secure: cfg.cookie_secure,
        })
    }

    pub fn sign(&self, session: &Session) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: session.user_id,
            sid: session.id,
            iat: session.created_at.unix_timestamp() as usize,
            exp: session.expires_at.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %session.user_id, session_id = %session.id, "session token signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    /// Cookie carrying a freshly issued credential.
    pub fn cookie(&self, token: &str) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), token.to_owned()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.cookie_secure)
            .max_age(self.ttl)
            .build()
    }

    /// Cookie that makes the client drop its credential.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build((self.cookie_name.clone(), ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.cookie_secure)
            .build();
        cookie.make_removal();
        cookie
    }

    /// This service's credential from the request cookies, unquoted.
    pub fn token_from_jar<'j>(&self, jar: &'j CookieJar) -> Option<&'j str> {
        jar.get(&self.cookie_name)
            .map(|c| c.value_trimmed())
            .filter(|v| !v.is_empty())
    }
}

/// A session that was just created, with the credential to hand to the client.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session: Session,
    pub token: String,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    keys: SessionKeys,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, keys: SessionKeys) -> Self {
        Self { store, keys }
    }

    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    /// Binds a new session to `user_id`. A previous session of the same
    /// client is discarded first so its identifier cannot be reused.
    pub async fn start(
        &self,
        user_id: Uuid,
        previous: Option<Uuid>,
    ) -> Result<IssuedSession, SessionError> {
        if let Some(old) = previous {
            self.store.delete_session(old).await?;
        }
        let expires_at = OffsetDateTime::now_utc() + self.keys.ttl;
        let session = self.store.create_session(user_id, expires_at).await?;
        let token = match self.keys.sign(&session) {
            Ok(t) => t,
            Err(e) => {
                self.store.delete_session(session.id).await?;
                return Err(e.into());
            }
        };
        Ok(IssuedSession { session, token })
    }

    /// Returns the live session named by `token`. Bad signatures, expired
    /// credentials and sessions no longer in the store all resolve to `None`.
    pub async fn resolve(&self, token: &str) -> Result<Option<Session>, SessionError> {
        let Ok(claims) = self.keys.verify(token) else {
            debug!("session token rejected");
            return Ok(None);
        };
        let session = self.store.find_session(claims.sid).await?;
        Ok(session
            .filter(|s| s.user_id == claims.sub)
            .filter(|s| !s.is_expired_at(OffsetDateTime::now_utc())))
    }

    /// Deletes the session named by `token`, if it is genuine.
    pub async fn end(&self, token: &str) -> Result<(), SessionError> {
        if let Ok(claims) = self.keys.verify(token) {
            self.store.delete_session(claims.sid).await?;
        }
        Ok(())
    }
}
