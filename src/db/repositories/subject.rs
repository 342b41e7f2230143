//! Subject repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Subject, SubjectWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait SubjectRepository: Send + Sync {
    async fn create(&self, title: &str, slug: &str) -> Result<Subject>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Subject>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Subject>>;
    /// All subjects ordered by title
    async fn list(&self) -> Result<Vec<Subject>>;
    /// All subjects ordered by title, with their course counts
    async fn list_with_counts(&self) -> Result<Vec<SubjectWithCount>>;
}

pub struct SqlxSubjectRepository {
    pool: DynDatabasePool,
}

impl SqlxSubjectRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SubjectRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! subject_from_row {
    ($row:expr) => {
        Subject {
            id: $row.get("id"),
            title: $row.get("title"),
            slug: $row.get("slug"),
        }
    };
}

#[async_trait]
impl SubjectRepository for SqlxSubjectRepository {
    async fn create(&self, title: &str, slug: &str) -> Result<Subject> {
        const SQL: &str = "INSERT INTO subjects (title, slug) VALUES (?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(title)
                .bind(slug)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create subject")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(title)
                .bind(slug)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create subject")?
                .last_insert_id() as i64,
        };
        Ok(Subject {
            id,
            title: title.to_string(),
            slug: slug.to_string(),
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Subject>> {
        const SQL: &str = "SELECT id, title, slug FROM subjects WHERE id = ?";
        let subject = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get subject")?
                .map(|row| subject_from_row!(row)),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get subject")?
                .map(|row| subject_from_row!(row)),
        };
        Ok(subject)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Subject>> {
        const SQL: &str = "SELECT id, title, slug FROM subjects WHERE slug = ?";
        let subject = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(slug)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get subject by slug")?
                .map(|row| subject_from_row!(row)),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(slug)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get subject by slug")?
                .map(|row| subject_from_row!(row)),
        };
        Ok(subject)
    }

    async fn list(&self) -> Result<Vec<Subject>> {
        const SQL: &str = "SELECT id, title, slug FROM subjects ORDER BY title, id";
        let subjects = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list subjects")?
                .iter()
                .map(|row| subject_from_row!(row))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list subjects")?
                .iter()
                .map(|row| subject_from_row!(row))
                .collect(),
        };
        Ok(subjects)
    }

    async fn list_with_counts(&self) -> Result<Vec<SubjectWithCount>> {
        const SQL: &str = r#"
            SELECT s.id, s.title, s.slug, COUNT(c.id) AS total_courses
            FROM subjects s
            LEFT JOIN courses c ON c.subject_id = s.id
            GROUP BY s.id, s.title, s.slug
            ORDER BY s.title, s.id
        "#;
        let subjects = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list subjects with counts")?
                .iter()
                .map(|row| SubjectWithCount {
                    subject: subject_from_row!(row),
                    total_courses: row.get("total_courses"),
                })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list subjects with counts")?
                .iter()
                .map(|row| SubjectWithCount {
                    subject: subject_from_row!(row),
                    total_courses: row.get("total_courses"),
                })
                .collect(),
        };
        Ok(subjects)
    }
}
