//! Transfer repository
//!
//! Database operations for peer-to-peer transfers.
//!
//! This module provides:
//! - `TransferRepository` trait defining the interface for transfer data access
//! - `SqlxTransferRepository` implementing the trait for SQLite and MySQL
//!
//! Transfers are append-only records; there is no update or delete.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Transfer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Transfer repository trait
#[async_trait]
pub trait TransferRepository: Send + Sync {
    /// Create a new transfer record
    async fn create(&self, transfer: &Transfer) -> Result<Transfer>;

    /// Get transfer by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Transfer>>;

    /// List transfers where the user is sender or recipient, newest first
    async fn list_for_user(
        &self,
        user_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Transfer>, i64)>;

    /// Count transfers where the user is sender or recipient
    async fn count_for_user(&self, user_id: i64) -> Result<i64>;
}

/// SQLx-based transfer repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTransferRepository {
    pool: DynDatabasePool,
}

impl SqlxTransferRepository {
    /// Create a new SQLx transfer repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TransferRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TransferRepository for SqlxTransferRepository {
    async fn create(&self, transfer: &Transfer) -> Result<Transfer> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_transfer_sqlite(self.pool.as_sqlite().unwrap(), transfer).await
            }
            DatabaseDriver::Mysql => {
                create_transfer_mysql(self.pool.as_mysql().unwrap(), transfer).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Transfer>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_transfer_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => {
                get_transfer_by_id_mysql(self.pool.as_mysql().unwrap(), id).await
            }
        }
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Transfer>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_transfers_for_user_sqlite(self.pool.as_sqlite().unwrap(), user_id, page, per_page)
                    .await
            }
            DatabaseDriver::Mysql => {
                list_transfers_for_user_mysql(self.pool.as_mysql().unwrap(), user_id, page, per_page)
                    .await
            }
        }
    }

    async fn count_for_user(&self, user_id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_transfers_for_user_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => {
                count_transfers_for_user_mysql(self.pool.as_mysql().unwrap(), user_id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_transfer_sqlite(pool: &SqlitePool, transfer: &Transfer) -> Result<Transfer> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO transfers (sender_id, recipient_id, amount_cents, note, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(transfer.sender_id)
    .bind(transfer.recipient_id)
    .bind(transfer.amount_cents)
    .bind(&transfer.note)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create transfer")?;

    let id = result.last_insert_rowid();

    Ok(Transfer {
        id,
        sender_id: transfer.sender_id,
        recipient_id: transfer.recipient_id,
        amount_cents: transfer.amount_cents,
        note: transfer.note.clone(),
        created_at: now,
    })
}

async fn get_transfer_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Transfer>> {
    let row = sqlx::query(
        r#"
        SELECT id, sender_id, recipient_id, amount_cents, note, created_at
        FROM transfers
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get transfer by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_transfer_sqlite(&row))),
        None => Ok(None),
    }
}

async fn list_transfers_for_user_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    page: i64,
    per_page: i64,
) -> Result<(Vec<Transfer>, i64)> {
    let offset = (page - 1) * per_page;

    let rows = sqlx::query(
        r#"
        SELECT id, sender_id, recipient_id, amount_cents, note, created_at
        FROM transfers
        WHERE sender_id = ? OR recipient_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list transfers")?;

    let transfers = rows.iter().map(row_to_transfer_sqlite).collect();
    let total = count_transfers_for_user_sqlite(pool, user_id).await?;

    Ok((transfers, total))
}

async fn count_transfers_for_user_sqlite(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM transfers WHERE sender_id = ? OR recipient_id = ?",
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("Failed to count transfers")?;

    Ok(row.get("count"))
}

fn row_to_transfer_sqlite(row: &sqlx::sqlite::SqliteRow) -> Transfer {
    Transfer {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        recipient_id: row.get("recipient_id"),
        amount_cents: row.get("amount_cents"),
        note: row.get("note"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_transfer_mysql(pool: &MySqlPool, transfer: &Transfer) -> Result<Transfer> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO transfers (sender_id, recipient_id, amount_cents, note, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(transfer.sender_id)
    .bind(transfer.recipient_id)
    .bind(transfer.amount_cents)
    .bind(&transfer.note)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create transfer")?;

    let id = result.last_insert_id() as i64;

    Ok(Transfer {
        id,
        sender_id: transfer.sender_id,
        recipient_id: transfer.recipient_id,
        amount_cents: transfer.amount_cents,
        note: transfer.note.clone(),
        created_at: now,
    })
}

async fn get_transfer_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Transfer>> {
    let row = sqlx::query(
        r#"
        SELECT id, sender_id, recipient_id, amount_cents, note, created_at
        FROM transfers
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get transfer by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_transfer_mysql(&row))),
        None => Ok(None),
    }
}

async fn list_transfers_for_user_mysql(
    pool: &MySqlPool,
    user_id: i64,
    page: i64,
    per_page: i64,
) -> Result<(Vec<Transfer>, i64)> {
    let offset = (page - 1) * per_page;

    let rows = sqlx::query(
        r#"
        SELECT id, sender_id, recipient_id, amount_cents, note, created_at
        FROM transfers
        WHERE sender_id = ? OR recipient_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list transfers")?;

    let transfers = rows.iter().map(row_to_transfer_mysql).collect();
    let total = count_transfers_for_user_mysql(pool, user_id).await?;

    Ok((transfers, total))
}

async fn count_transfers_for_user_mysql(pool: &MySqlPool, user_id: i64) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM transfers WHERE sender_id = ? OR recipient_id = ?",
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("Failed to count transfers")?;

    Ok(row.get("count"))
}

fn row_to_transfer_mysql(row: &sqlx::mysql::MySqlRow) -> Transfer {
    Transfer {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        recipient_id: row.get("recipient_id"),
        amount_cents: row.get("amount_cents"),
        note: row.get("note"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxTransferRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxTransferRepository::new(pool.clone());
        (pool, repo)
    }

    async fn create_test_user(pool: &DynDatabasePool, id: i64) {
        let now = Utc::now();
        if let Some(sqlite_pool) = pool.as_sqlite() {
            sqlx::query(
                r#"
                INSERT INTO users (id, email, display_name, password_hash, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(format!("user{}@example.com", id))
            .bind(format!("User {}", id))
            .bind("hash")
            .bind(now)
            .bind(now)
            .execute(sqlite_pool)
            .await
            .expect("Failed to create test user");
        }
    }

    #[tokio::test]
    async fn test_create_transfer() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;
        create_test_user(&pool, 2).await;

        let transfer = Transfer::new(1, 2, 2500, Some("lunch".to_string()));
        let created = repo.create(&transfer).await.expect("Failed to create transfer");

        assert!(created.id > 0);
        assert_eq!(created.sender_id, 1);
        assert_eq!(created.recipient_id, 2);
        assert_eq!(created.amount_cents, 2500);
        assert_eq!(created.note.as_deref(), Some("lunch"));
    }

    #[tokio::test]
    async fn test_get_transfer_by_id() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;
        create_test_user(&pool, 2).await;

        let created = repo
            .create(&Transfer::new(1, 2, 100, None))
            .await
            .expect("Failed to create transfer");

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get transfer")
            .expect("Transfer not found");

        assert_eq!(found.id, created.id);
        assert_eq!(found.amount_cents, 100);
        assert!(found.note.is_none());
    }

    #[tokio::test]
    async fn test_get_transfer_by_id_not_found() {
        let (_pool, repo) = setup_test_repo().await;

        let found = repo.get_by_id(999).await.expect("Failed to get transfer");

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_list_for_user_includes_sent_and_received() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;
        create_test_user(&pool, 2).await;
        create_test_user(&pool, 3).await;

        repo.create(&Transfer::new(1, 2, 100, None))
            .await
            .expect("Failed to create transfer");
        repo.create(&Transfer::new(2, 1, 200, None))
            .await
            .expect("Failed to create transfer");
        repo.create(&Transfer::new(2, 3, 300, None))
            .await
            .expect("Failed to create transfer");

        let (transfers, total) = repo
            .list_for_user(1, 1, 10)
            .await
            .expect("Failed to list transfers");

        assert_eq!(total, 2);
        assert_eq!(transfers.len(), 2);
        assert!(transfers.iter().all(|t| t.involves(1)));
    }

    #[tokio::test]
    async fn test_list_for_user_pagination() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;
        create_test_user(&pool, 2).await;

        for i in 1..=5 {
            repo.create(&Transfer::new(1, 2, i * 100, None))
                .await
                .expect("Failed to create transfer");
        }

        let (page1, total) = repo
            .list_for_user(1, 1, 2)
            .await
            .expect("Failed to list transfers");
        assert_eq!(page1.len(), 2);
        assert_eq!(total, 5);

        let (page3, _) = repo
            .list_for_user(1, 3, 2)
            .await
            .expect("Failed to list transfers");
        assert_eq!(page3.len(), 1);
    }

    #[tokio::test]
    async fn test_count_for_user() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;
        create_test_user(&pool, 2).await;
        create_test_user(&pool, 3).await;

        repo.create(&Transfer::new(1, 2, 100, None))
            .await
            .expect("Failed to create transfer");
        repo.create(&Transfer::new(3, 2, 100, None))
            .await
            .expect("Failed to create transfer");

        assert_eq!(repo.count_for_user(1).await.unwrap(), 1);
        assert_eq!(repo.count_for_user(2).await.unwrap(), 2);
        assert_eq!(repo.count_for_user(3).await.unwrap(), 1);
    }
}
