//! Content repository
//!
//! Contents place items inside modules. Ownership is checked through the
//! module's course, not through the item.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Content, ItemKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

use super::item::{delete_items_mysql, delete_items_sqlite};

#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Append an item to a module, after its current last content
    async fn create(&self, module_id: i64, kind: ItemKind, item_id: i64) -> Result<Content>;
    /// Content `id` if its module's course is owned by `owner_id`
    async fn get_owned(&self, id: i64, owner_id: i64) -> Result<Option<Content>>;
    /// Contents of a module by ascending order
    async fn list_by_module(&self, module_id: i64) -> Result<Vec<Content>>;
    /// Delete an owned content and the item it references
    async fn delete_with_item(&self, id: i64, owner_id: i64) -> Result<bool>;
    /// Set the order of an owned content. Missing or foreign contents are skipped.
    async fn update_order_owned(&self, id: i64, owner_id: i64, sort_order: i32) -> Result<bool>;
}

macro_rules! content_from_row {
    ($row:expr) => {{
        let item_type: String = $row.get("item_type");
        let kind = ItemKind::from_tag(&item_type)
            .with_context(|| format!("Invalid item type in database: {}", item_type))?;
        Content {
            id: $row.get("id"),
            module_id: $row.get("module_id"),
            sort_order: $row.get("sort_order"),
            item_type: kind,
            item_id: $row.get("item_id"),
        }
    }};
}

pub struct SqlxContentRepository {
    pool: DynDatabasePool,
}

impl SqlxContentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContentRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_contents(&self, sql: &str, binds: &[i64]) -> Result<Vec<Content>> {
        let mut contents = Vec::new();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query::<sqlx::Sqlite>(sql);
                for bind in binds {
                    query = query.bind(*bind);
                }
                let rows = query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to fetch contents")?;
                for row in rows {
                    contents.push(content_from_row!(row));
                }
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query::<sqlx::MySql>(sql);
                for bind in binds {
                    query = query.bind(*bind);
                }
                let rows = query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to fetch contents")?;
                for row in rows {
                    contents.push(content_from_row!(row));
                }
            }
        }
        Ok(contents)
    }
}

const CONTENT_COLUMNS: &str = "ct.id, ct.module_id, ct.sort_order, ct.item_type, ct.item_id";
const MAX_ORDER: &str = "SELECT MAX(sort_order) FROM contents WHERE module_id = ?";
const INSERT_CONTENT: &str =
    "INSERT INTO contents (module_id, item_type, item_id, sort_order) VALUES (?, ?, ?, ?)";
const OWNED_FILTER: &str = r#"
    ct.id = ? AND ct.module_id IN (
        SELECT m.id FROM modules m JOIN courses c ON c.id = m.course_id WHERE c.owner_id = ?
    )
"#;

#[async_trait]
impl ContentRepository for SqlxContentRepository {
    async fn create(&self, module_id: i64, kind: ItemKind, item_id: i64) -> Result<Content> {
        let (id, sort_order) = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = self.pool.sqlite()?.begin().await?;
                let max: Option<i32> = sqlx::query_scalar(MAX_ORDER)
                    .bind(module_id)
                    .fetch_one(&mut *tx)
                    .await
                    .context("Failed to read content order")?;
                let sort_order = max.map_or(0, |max| max + 1);
                let id = sqlx::query(INSERT_CONTENT)
                    .bind(module_id)
                    .bind(kind.tag())
                    .bind(item_id)
                    .bind(sort_order)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to create content")?
                    .last_insert_rowid();
                tx.commit().await?;
                (id, sort_order)
            }
            DatabaseDriver::Mysql => {
                let mut tx = self.pool.mysql()?.begin().await?;
                let max: Option<i32> = sqlx::query_scalar(MAX_ORDER)
                    .bind(module_id)
                    .fetch_one(&mut *tx)
                    .await
                    .context("Failed to read content order")?;
                let sort_order = max.map_or(0, |max| max + 1);
                let id = sqlx::query(INSERT_CONTENT)
                    .bind(module_id)
                    .bind(kind.tag())
                    .bind(item_id)
                    .bind(sort_order)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to create content")?
                    .last_insert_id() as i64;
                tx.commit().await?;
                (id, sort_order)
            }
        };
        Ok(Content {
            id,
            module_id,
            sort_order,
            item_type: kind,
            item_id,
        })
    }

    async fn get_owned(&self, id: i64, owner_id: i64) -> Result<Option<Content>> {
        let sql = format!("SELECT {} FROM contents ct WHERE {}", CONTENT_COLUMNS, OWNED_FILTER);
        Ok(self.fetch_contents(&sql, &[id, owner_id]).await?.into_iter().next())
    }

    async fn list_by_module(&self, module_id: i64) -> Result<Vec<Content>> {
        let sql = format!(
            "SELECT {} FROM contents ct WHERE ct.module_id = ? ORDER BY ct.sort_order, ct.id",
            CONTENT_COLUMNS
        );
        self.fetch_contents(&sql, &[module_id]).await
    }

    async fn delete_with_item(&self, id: i64, owner_id: i64) -> Result<bool> {
        let select = format!("SELECT ct.item_type, ct.item_id FROM contents ct WHERE {}", OWNED_FILTER);
        const DELETE: &str = "DELETE FROM contents WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = self.pool.sqlite()?.begin().await?;
                let refs: Vec<(String, i64)> = sqlx::query_as(&select)
                    .bind(id)
                    .bind(owner_id)
                    .fetch_all(&mut *tx)
                    .await
                    .context("Failed to get content item")?;
                if refs.is_empty() {
                    return Ok(false);
                }
                delete_items_sqlite(&mut tx, &refs).await?;
                sqlx::query(DELETE)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete content")?;
                tx.commit().await?;
            }
            DatabaseDriver::Mysql => {
                let mut tx = self.pool.mysql()?.begin().await?;
                let refs: Vec<(String, i64)> = sqlx::query_as(&select)
                    .bind(id)
                    .bind(owner_id)
                    .fetch_all(&mut *tx)
                    .await
                    .context("Failed to get content item")?;
                if refs.is_empty() {
                    return Ok(false);
                }
                delete_items_mysql(&mut tx, &refs).await?;
                sqlx::query(DELETE)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete content")?;
                tx.commit().await?;
            }
        }
        Ok(true)
    }

    async fn update_order_owned(&self, id: i64, owner_id: i64, sort_order: i32) -> Result<bool> {
        const SQL: &str = r#"
            UPDATE contents SET sort_order = ?
            WHERE id = ? AND module_id IN (
                SELECT m.id FROM modules m JOIN courses c ON c.id = m.course_id WHERE c.owner_id = ?
            )
        "#;
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(sort_order)
                .bind(id)
                .bind(owner_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update content order")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(sort_order)
                .bind(id)
                .bind(owner_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to update content order")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}
