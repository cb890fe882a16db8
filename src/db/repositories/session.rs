//! Session repository
//!
//! Persistence for bearer-token sessions. Tokens are opaque strings issued
//! by the account service; the repository only stores and revokes them.
//! `revoke_all_for_user` backs the password-change flow, which invalidates
//! every outstanding token for the account in one step.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a newly issued session
    async fn insert(&self, session: &Session) -> Result<Session>;

    /// Look up a session by its bearer token
    async fn find_by_token(&self, token: &str) -> Result<Option<Session>>;

    /// Revoke a single session. Revoking an unknown token is a no-op.
    async fn revoke(&self, token: &str) -> Result<()>;

    /// Revoke every session belonging to a user
    async fn revoke_all_for_user(&self, user_id: i64) -> Result<()>;

    /// Remove sessions past their expiry, returning how many were removed
    async fn purge_expired(&self) -> Result<i64>;
}

/// SQLx-backed session repository, dispatching on the configured driver
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Construct behind the trait object used for injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn insert(&self, session: &Session) -> Result<Session> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                insert_sqlite(self.pool.as_sqlite().unwrap(), session).await
            }
            DatabaseDriver::Mysql => insert_mysql(self.pool.as_mysql().unwrap(), session).await,
        }
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_by_token_sqlite(self.pool.as_sqlite().unwrap(), token).await
            }
            DatabaseDriver::Mysql => {
                find_by_token_mysql(self.pool.as_mysql().unwrap(), token).await
            }
        }
    }

    async fn revoke(&self, token: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => revoke_sqlite(self.pool.as_sqlite().unwrap(), token).await,
            DatabaseDriver::Mysql => revoke_mysql(self.pool.as_mysql().unwrap(), token).await,
        }
    }

    async fn revoke_all_for_user(&self, user_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                revoke_all_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => {
                revoke_all_mysql(self.pool.as_mysql().unwrap(), user_id).await
            }
        }
    }

    async fn purge_expired(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => purge_expired_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => purge_expired_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }
}

const INSERT_SQL: &str =
    "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)";
const SELECT_SQL: &str = "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?";
const REVOKE_SQL: &str = "DELETE FROM sessions WHERE id = ?";
const REVOKE_ALL_SQL: &str = "DELETE FROM sessions WHERE user_id = ?";
const PURGE_SQL: &str = "DELETE FROM sessions WHERE expires_at < ?";

// SQLite

async fn insert_sqlite(pool: &SqlitePool, session: &Session) -> Result<Session> {
    sqlx::query(INSERT_SQL)
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(pool)
        .await
        .context("Failed to insert session")?;

    Ok(session.clone())
}

async fn find_by_token_sqlite(pool: &SqlitePool, token: &str) -> Result<Option<Session>> {
    sqlx::query(SELECT_SQL)
        .bind(token)
        .fetch_optional(pool)
        .await
        .context("Failed to look up session")?
        .map(|row| session_from_sqlite_row(&row))
        .transpose()
}

async fn revoke_sqlite(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query(REVOKE_SQL)
        .bind(token)
        .execute(pool)
        .await
        .context("Failed to revoke session")?;
    Ok(())
}

async fn revoke_all_sqlite(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query(REVOKE_ALL_SQL)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to revoke user sessions")?;
    Ok(())
}

async fn purge_expired_sqlite(pool: &SqlitePool) -> Result<i64> {
    let result = sqlx::query(PURGE_SQL)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to purge expired sessions")?;
    Ok(result.rows_affected() as i64)
}

fn session_from_sqlite_row(row: &sqlx::sqlite::SqliteRow) -> Result<Session> {
    Ok(Session {
        id: row.try_get("id").context("missing session id")?,
        user_id: row.try_get("user_id").context("missing user_id")?,
        expires_at: row.try_get("expires_at").context("missing expires_at")?,
        created_at: row.try_get("created_at").context("missing created_at")?,
    })
}

// MySQL

async fn insert_mysql(pool: &MySqlPool, session: &Session) -> Result<Session> {
    sqlx::query(INSERT_SQL)
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(pool)
        .await
        .context("Failed to insert session")?;

    Ok(session.clone())
}

async fn find_by_token_mysql(pool: &MySqlPool, token: &str) -> Result<Option<Session>> {
    sqlx::query(SELECT_SQL)
        .bind(token)
        .fetch_optional(pool)
        .await
        .context("Failed to look up session")?
        .map(|row| session_from_mysql_row(&row))
        .transpose()
}

async fn revoke_mysql(pool: &MySqlPool, token: &str) -> Result<()> {
    sqlx::query(REVOKE_SQL)
        .bind(token)
        .execute(pool)
        .await
        .context("Failed to revoke session")?;
    Ok(())
}

async fn revoke_all_mysql(pool: &MySqlPool, user_id: i64) -> Result<()> {
    sqlx::query(REVOKE_ALL_SQL)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to revoke user sessions")?;
    Ok(())
}

async fn purge_expired_mysql(pool: &MySqlPool) -> Result<i64> {
    let result = sqlx::query(PURGE_SQL)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to purge expired sessions")?;
    Ok(result.rows_affected() as i64)
}

fn session_from_mysql_row(row: &sqlx::mysql::MySqlRow) -> Result<Session> {
    let expires_at: DateTime<Utc> = row.try_get("expires_at").context("missing expires_at")?;
    let created_at: DateTime<Utc> = row.try_get("created_at").context("missing created_at")?;
    Ok(Session {
        id: row.try_get("id").context("missing session id")?,
        user_id: row.try_get("user_id").context("missing user_id")?,
        expires_at,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup() -> (DynDatabasePool, SqlxSessionRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxSessionRepository::new(pool.clone());
        (pool, repo)
    }

    // Sessions reference users, so seed one per id used
    async fn seed_user(pool: &DynDatabasePool, id: i64) {
        let now = Utc::now();
        if let Some(sqlite_pool) = pool.as_sqlite() {
            sqlx::query(
                "INSERT INTO users (id, email, display_name, password_hash, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(format!("user{}@example.com", id))
            .bind(format!("User {}", id))
            .bind("$argon2id$placeholder")
            .bind(now)
            .bind(now)
            .execute(sqlite_pool)
            .await
            .expect("Failed to seed user");
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_by_token() {
        let (pool, repo) = setup().await;
        seed_user(&pool, 1).await;

        let session = Session::issue(1, 7);
        repo.insert(&session).await.expect("Failed to insert");

        let found = repo
            .find_by_token(&session.id)
            .await
            .expect("Lookup failed")
            .expect("Session should exist");

        assert_eq!(found.id, session.id);
        assert_eq!(found.user_id, 1);
        assert!(!found.is_expired());
    }

    #[tokio::test]
    async fn test_find_unknown_token_returns_none() {
        let (_pool, repo) = setup().await;

        let found = repo
            .find_by_token("no-such-token")
            .await
            .expect("Lookup failed");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_revoke_removes_session() {
        let (pool, repo) = setup().await;
        seed_user(&pool, 1).await;

        let session = Session::issue(1, 7);
        repo.insert(&session).await.expect("Failed to insert");
        repo.revoke(&session.id).await.expect("Revoke failed");

        let found = repo
            .find_by_token(&session.id)
            .await
            .expect("Lookup failed");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_revoke_unknown_token_is_noop() {
        let (_pool, repo) = setup().await;
        repo.revoke("no-such-token").await.expect("Revoke failed");
    }

    #[tokio::test]
    async fn test_revoke_all_spares_other_users() {
        let (pool, repo) = setup().await;
        seed_user(&pool, 1).await;
        seed_user(&pool, 2).await;

        let first = Session::issue(1, 7);
        let second = Session::issue(1, 7);
        let other = Session::issue(2, 7);
        for s in [&first, &second, &other] {
            repo.insert(s).await.expect("Failed to insert");
        }

        repo.revoke_all_for_user(1).await.expect("Revoke failed");

        assert!(repo.find_by_token(&first.id).await.unwrap().is_none());
        assert!(repo.find_by_token(&second.id).await.unwrap().is_none());
        assert!(repo.find_by_token(&other.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_expired_only_removes_past_expiry() {
        let (pool, repo) = setup().await;
        seed_user(&pool, 1).await;

        let mut stale = Session::issue(1, 7);
        stale.expires_at = Utc::now() - Duration::days(1);
        let live = Session::issue(1, 7);

        repo.insert(&stale).await.expect("Failed to insert");
        repo.insert(&live).await.expect("Failed to insert");

        let purged = repo.purge_expired().await.expect("Purge failed");
        assert_eq!(purged, 1);
        assert!(repo.find_by_token(&stale.id).await.unwrap().is_none());
        assert!(repo.find_by_token(&live.id).await.unwrap().is_some());
    }
}
