//! Content item repository
//!
//! Each item kind has its own table. Table and column names come from
//! [`ItemKind`], never from request input, so they are safe to format into SQL.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Item, ItemKind, ItemPayload};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlConnection, Row, SqliteConnection};
use std::sync::Arc;

#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Insert an item into the table of its payload's kind
    async fn create(&self, owner_id: i64, title: &str, payload: &ItemPayload) -> Result<Item>;
    async fn get(&self, kind: ItemKind, id: i64) -> Result<Option<Item>>;
    /// Item `id` of `kind` if it is owned by `owner_id`
    async fn get_owned(&self, kind: ItemKind, id: i64, owner_id: i64) -> Result<Option<Item>>;
    /// Update title and payload of an owned item
    async fn update_owned(&self, id: i64, owner_id: i64, title: &str, payload: &ItemPayload) -> Result<bool>;
}

macro_rules! item_from_row {
    ($row:expr, $kind:expr) => {
        Item {
            id: $row.get("id"),
            owner_id: $row.get("owner_id"),
            title: $row.get("title"),
            payload: ItemPayload::from_parts($kind, $row.get("payload")),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

pub struct SqlxItemRepository {
    pool: DynDatabasePool,
}

impl SqlxItemRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ItemRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch(&self, kind: ItemKind, sql: &str, binds: &[i64]) -> Result<Option<Item>> {
        let item = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query::<sqlx::Sqlite>(sql);
                for bind in binds {
                    query = query.bind(*bind);
                }
                query
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .with_context(|| format!("Failed to get {} item", kind))?
                    .map(|row| item_from_row!(row, kind))
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query::<sqlx::MySql>(sql);
                for bind in binds {
                    query = query.bind(*bind);
                }
                query
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .with_context(|| format!("Failed to get {} item", kind))?
                    .map(|row| item_from_row!(row, kind))
            }
        };
        Ok(item)
    }
}

fn select_sql(kind: ItemKind, filter: &str) -> String {
    format!(
        "SELECT id, owner_id, title, {} AS payload, created_at, updated_at FROM {} WHERE {}",
        kind.payload_column(),
        kind.table(),
        filter
    )
}

#[async_trait]
impl ItemRepository for SqlxItemRepository {
    async fn create(&self, owner_id: i64, title: &str, payload: &ItemPayload) -> Result<Item> {
        let kind = payload.kind();
        let sql = format!(
            "INSERT INTO {} (owner_id, title, {}, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            kind.table(),
            kind.payload_column()
        );
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(owner_id)
                .bind(title)
                .bind(payload.value())
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .with_context(|| format!("Failed to create {} item", kind))?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(owner_id)
                .bind(title)
                .bind(payload.value())
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .with_context(|| format!("Failed to create {} item", kind))?
                .last_insert_id() as i64,
        };
        Ok(Item {
            id,
            owner_id,
            title: title.to_string(),
            payload: payload.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get(&self, kind: ItemKind, id: i64) -> Result<Option<Item>> {
        self.fetch(kind, &select_sql(kind, "id = ?"), &[id]).await
    }

    async fn get_owned(&self, kind: ItemKind, id: i64, owner_id: i64) -> Result<Option<Item>> {
        self.fetch(kind, &select_sql(kind, "id = ? AND owner_id = ?"), &[id, owner_id])
            .await
    }

    async fn update_owned(&self, id: i64, owner_id: i64, title: &str, payload: &ItemPayload) -> Result<bool> {
        let kind = payload.kind();
        let sql = format!(
            "UPDATE {} SET title = ?, {} = ?, updated_at = ? WHERE id = ? AND owner_id = ?",
            kind.table(),
            kind.payload_column()
        );
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(title)
                .bind(payload.value())
                .bind(now)
                .bind(id)
                .bind(owner_id)
                .execute(self.pool.sqlite()?)
                .await
                .with_context(|| format!("Failed to update {} item", kind))?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(title)
                .bind(payload.value())
                .bind(now)
                .bind(id)
                .bind(owner_id)
                .execute(self.pool.mysql()?)
                .await
                .with_context(|| format!("Failed to update {} item", kind))?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

fn delete_sql(item_type: &str) -> Result<String> {
    let kind = ItemKind::from_tag(item_type)
        .with_context(|| format!("Invalid item type in database: {}", item_type))?;
    Ok(format!("DELETE FROM {} WHERE id = ?", kind.table()))
}

/// Delete the items behind `(item_type, item_id)` content references.
pub(crate) async fn delete_items_sqlite(conn: &mut SqliteConnection, refs: &[(String, i64)]) -> Result<()> {
    for (item_type, item_id) in refs {
        sqlx::query(&delete_sql(item_type)?)
            .bind(*item_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to delete {} item {}", item_type, item_id))?;
    }
    Ok(())
}

/// Delete the items behind `(item_type, item_id)` content references.
pub(crate) async fn delete_items_mysql(conn: &mut MySqlConnection, refs: &[(String, i64)]) -> Result<()> {
    for (item_type, item_id) in refs {
        sqlx::query(&delete_sql(item_type)?)
            .bind(*item_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to delete {} item {}", item_type, item_id))?;
    }
    Ok(())
}
