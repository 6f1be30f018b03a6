use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{IdentityStore, NewUser, Session, SessionStore, StoreError, UserAccount};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

fn backend(e: sqlx::Error, what: &'static str) -> StoreError {
    StoreError::Backend(anyhow::Error::new(e).context(what))
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn username_taken(&self, username: &str) -> Result<bool, StoreError> {
        let taken: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE lower(username) = lower($1))"#,
        )
        .bind(username)
        .fetch_one(&self.db)
        .await
        .map_err(|e| backend(e, "check username"))?;
        Ok(taken)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserAccount>, StoreError> {
        sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| backend(e, "find user by username"))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, StoreError> {
        sqlx::query_as::<_, UserAccount>(
            r#"SELECT id, username, email, password_hash, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| backend(e, "find user by id"))
    }

    async fn insert_user(&self, user: NewUser) -> Result<UserAccount, StoreError> {
        // The unique index on lower(username) makes this the atomic check.
        let inserted = sqlx::query_as::<_, UserAccount>(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            RETURNING id, username, email, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_optional(&self.db)
        .await;

        match inserted {
            Ok(Some(account)) => Ok(account),
            Ok(None) => Err(StoreError::Conflict { field: "username" }),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Conflict { field: "username" })
            }
            Err(e) => Err(backend(e, "insert user")),
        }
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| backend(e, "delete user"))?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(
        &self,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<Session, StoreError> {
        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, created_at, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| backend(e, "insert session"))
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        sqlx::query_as::<_, Session>(
            r#"SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| backend(e, "find session"))
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(r#"DELETE FROM sessions WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| backend(e, "delete session"))?;
        Ok(())
    }
}
