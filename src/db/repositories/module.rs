//! Module repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Module;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

use super::item::{delete_items_mysql, delete_items_sqlite};

#[async_trait]
pub trait ModuleRepository: Send + Sync {
    /// Append a module to a course. It takes the order after the course's
    /// current last module, or 0 for the first one.
    async fn create(&self, course_id: i64, title: &str, description: &str) -> Result<Module>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Module>>;
    /// Module `id` if its course is owned by `owner_id`
    async fn get_owned(&self, id: i64, owner_id: i64) -> Result<Option<Module>>;
    /// Modules of a course by ascending order
    async fn list_by_course(&self, course_id: i64) -> Result<Vec<Module>>;
    /// Update title and description of a module belonging to `module.course_id`
    async fn update(&self, module: &Module) -> Result<bool>;
    /// Delete a module of `course_id` together with its contents and their items
    async fn delete(&self, id: i64, course_id: i64) -> Result<bool>;
    /// Set the order of a module whose course is owned by `owner_id`.
    /// Returns false, changing nothing, for missing or foreign modules.
    async fn update_order_owned(&self, id: i64, owner_id: i64, sort_order: i32) -> Result<bool>;
}

pub struct SqlxModuleRepository {
    pool: DynDatabasePool,
}

macro_rules! module_from_row {
    ($row:expr) => {
        Module {
            id: $row.get("id"),
            course_id: $row.get("course_id"),
            title: $row.get("title"),
            description: $row.get("description"),
            sort_order: $row.get("sort_order"),
        }
    };
}

impl SqlxModuleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ModuleRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_modules(&self, sql: &str, binds: &[i64]) -> Result<Vec<Module>> {
        let modules = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query::<sqlx::Sqlite>(sql);
                for bind in binds {
                    query = query.bind(*bind);
                }
                query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to fetch modules")?
                    .iter()
                    .map(|row| module_from_row!(row))
                    .collect()
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query::<sqlx::MySql>(sql);
                for bind in binds {
                    query = query.bind(*bind);
                }
                query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to fetch modules")?
                    .iter()
                    .map(|row| module_from_row!(row))
                    .collect()
            }
        };
        Ok(modules)
    }
}

const MODULE_COLUMNS: &str = "m.id, m.course_id, m.title, m.description, m.sort_order";
const MAX_ORDER: &str = "SELECT MAX(sort_order) FROM modules WHERE course_id = ?";
const INSERT_MODULE: &str =
    "INSERT INTO modules (course_id, title, description, sort_order) VALUES (?, ?, ?, ?)";

fn next_order(max: Option<i32>) -> i32 {
    max.map_or(0, |max| max + 1)
}

#[async_trait]
impl ModuleRepository for SqlxModuleRepository {
    async fn create(&self, course_id: i64, title: &str, description: &str) -> Result<Module> {
        let (id, sort_order) = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = self.pool.sqlite()?.begin().await?;
                let max: Option<i32> = sqlx::query_scalar(MAX_ORDER)
                    .bind(course_id)
                    .fetch_one(&mut *tx)
                    .await
                    .context("Failed to read module order")?;
                let sort_order = next_order(max);
                let id = sqlx::query(INSERT_MODULE)
                    .bind(course_id)
                    .bind(title)
                    .bind(description)
                    .bind(sort_order)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to create module")?
                    .last_insert_rowid();
                tx.commit().await?;
                (id, sort_order)
            }
            DatabaseDriver::Mysql => {
                let mut tx = self.pool.mysql()?.begin().await?;
                let max: Option<i32> = sqlx::query_scalar(MAX_ORDER)
                    .bind(course_id)
                    .fetch_one(&mut *tx)
                    .await
                    .context("Failed to read module order")?;
                let sort_order = next_order(max);
                let id = sqlx::query(INSERT_MODULE)
                    .bind(course_id)
                    .bind(title)
                    .bind(description)
                    .bind(sort_order)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to create module")?
                    .last_insert_id() as i64;
                tx.commit().await?;
                (id, sort_order)
            }
        };
        Ok(Module {
            id,
            course_id,
            title: title.to_string(),
            description: description.to_string(),
            sort_order,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Module>> {
        let sql = format!("SELECT {} FROM modules m WHERE m.id = ?", MODULE_COLUMNS);
        Ok(self.fetch_modules(&sql, &[id]).await?.into_iter().next())
    }

    async fn get_owned(&self, id: i64, owner_id: i64) -> Result<Option<Module>> {
        let sql = format!(
            "SELECT {} FROM modules m JOIN courses c ON c.id = m.course_id WHERE m.id = ? AND c.owner_id = ?",
            MODULE_COLUMNS
        );
        Ok(self.fetch_modules(&sql, &[id, owner_id]).await?.into_iter().next())
    }

    async fn list_by_course(&self, course_id: i64) -> Result<Vec<Module>> {
        let sql = format!(
            "SELECT {} FROM modules m WHERE m.course_id = ? ORDER BY m.sort_order, m.id",
            MODULE_COLUMNS
        );
        self.fetch_modules(&sql, &[course_id]).await
    }

    async fn update(&self, module: &Module) -> Result<bool> {
        const SQL: &str = "UPDATE modules SET title = ?, description = ? WHERE id = ? AND course_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(&module.title)
                .bind(&module.description)
                .bind(module.id)
                .bind(module.course_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update module")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(&module.title)
                .bind(&module.description)
                .bind(module.id)
                .bind(module.course_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to update module")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64, course_id: i64) -> Result<bool> {
        const REFS: &str = r#"
            SELECT ct.item_type, ct.item_id
            FROM contents ct
            JOIN modules m ON m.id = ct.module_id
            WHERE m.id = ? AND m.course_id = ?
        "#;
        const DELETE: &str = "DELETE FROM modules WHERE id = ? AND course_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = self.pool.sqlite()?.begin().await?;
                let refs: Vec<(String, i64)> = sqlx::query_as(REFS)
                    .bind(id)
                    .bind(course_id)
                    .fetch_all(&mut *tx)
                    .await
                    .context("Failed to collect module items")?;
                delete_items_sqlite(&mut tx, &refs).await?;
                let affected = sqlx::query(DELETE)
                    .bind(id)
                    .bind(course_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete module")?
                    .rows_affected();
                tx.commit().await?;
                affected
            }
            DatabaseDriver::Mysql => {
                let mut tx = self.pool.mysql()?.begin().await?;
                let refs: Vec<(String, i64)> = sqlx::query_as(REFS)
                    .bind(id)
                    .bind(course_id)
                    .fetch_all(&mut *tx)
                    .await
                    .context("Failed to collect module items")?;
                delete_items_mysql(&mut tx, &refs).await?;
                let affected = sqlx::query(DELETE)
                    .bind(id)
                    .bind(course_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete module")?
                    .rows_affected();
                tx.commit().await?;
                affected
            }
        };
        Ok(affected > 0)
    }

    async fn update_order_owned(&self, id: i64, owner_id: i64, sort_order: i32) -> Result<bool> {
        const SQL: &str = r#"
            UPDATE modules SET sort_order = ?
            WHERE id = ? AND course_id IN (SELECT id FROM courses WHERE owner_id = ?)
        "#;
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(sort_order)
                .bind(id)
                .bind(owner_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update module order")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(sort_order)
                .bind(id)
                .bind(owner_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to update module order")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}
