use serde::Deserialize;

const DEV_SESSION_SECRET: &str = "dev-insecure-session-secret";

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

/// Knobs for the password strength policy applied at registration.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordPolicyConfig {
    pub min_length: usize,
    pub max_similarity: f64,
}

impl Default for PasswordPolicyConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_similarity: 0.7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory identity store.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub session: SessionConfig,
    pub password: PasswordPolicyConfig,
}

impl SessionConfig {
    /// Longest session lifetime accepted from configuration: one year.
    pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

    /// Rejects settings that would panic later or issue unusable sessions.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=Self::MAX_TTL_MINUTES).contains(&self.ttl_minutes) {
            anyhow::bail!(
                "SESSION_TTL_MINUTES must be between 1 and {}, got {}",
                Self::MAX_TTL_MINUTES,
                self.ttl_minutes
            );
        }
        if !is_cookie_token(&self.cookie_name) {
            anyhow::bail!("SESSION_COOKIE_NAME {:?} is not a valid cookie name", self.cookie_name);
        }
        Ok(())
    }
}

// RFC 6265 cookie-name: visible ASCII without separators.
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?={}".contains(c))
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source; `from_env` passes
    /// the process environment.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let parse = |key: &str| var(key).filter(|v| !v.is_empty());
        let database_url = parse("DATABASE_URL");

        let secret = match parse("SESSION_SECRET") {
            Some(s) => s,
            None if database_url.is_some() => {
                anyhow::bail!("SESSION_SECRET must be set when DATABASE_URL is configured")
            }
            None => DEV_SESSION_SECRET.to_string(),
        };

        let session = SessionConfig {
            secret,
            issuer: parse("SESSION_ISSUER").unwrap_or_else(|| "account-portal".into()),
            audience: parse("SESSION_AUDIENCE").unwrap_or_else(|| "account-portal-users".into()),
            ttl_minutes: parsed(&var, "SESSION_TTL_MINUTES")?.unwrap_or(60 * 24 * 14),
            cookie_name: parse("SESSION_COOKIE_NAME").unwrap_or_else(|| "sessionid".into()),
            cookie_secure: parsed(&var, "SESSION_COOKIE_SECURE")?.unwrap_or(false),
        };
        session.validate()?;

        let defaults = PasswordPolicyConfig::default();
        let password = PasswordPolicyConfig {
            min_length: parsed(&var, "PASSWORD_MIN_LENGTH")?.unwrap_or(defaults.min_length),
            max_similarity: parsed(&var, "PASSWORD_MAX_SIMILARITY")?
                .unwrap_or(defaults.max_similarity),
        };

        Ok(Self {
            database_url,
            host: parse("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&var, "APP_PORT")?.unwrap_or(8080),
            session,
            password,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            host: "127.0.0.1".into(),
            port: 0,
            session: SessionConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60,
                cookie_name: "sessionid".into(),
                cookie_secure: false,
            },
            password: PasswordPolicyConfig::default(),
        }
    }
}

/// Parses `key` when set. A value that does not parse is an error rather
/// than a silent fallback to the default.
fn parsed<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(key).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{key}={raw:?} is invalid: {e}")),
        None => Ok(None),
    }
}
