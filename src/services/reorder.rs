//! Bulk reorder of modules and contents
//!
//! Each entry is applied on its own. Entries for rows the user does not own,
//! or for rows that do not exist, are skipped without an error.

use crate::db::repositories::{ContentRepository, ModuleRepository};
use crate::models::{OrderMap, User};
use anyhow::{Context, Result};
use std::sync::Arc;

pub struct ReorderService {
    module_repo: Arc<dyn ModuleRepository>,
    content_repo: Arc<dyn ContentRepository>,
}

impl ReorderService {
    pub fn new(module_repo: Arc<dyn ModuleRepository>, content_repo: Arc<dyn ContentRepository>) -> Self {
        Self {
            module_repo,
            content_repo,
        }
    }

    /// Returns the number of modules whose order was written.
    pub async fn reorder_modules(&self, user: &User, order: &OrderMap) -> Result<usize> {
        let mut saved = 0;
        for entry in order.items() {
            let updated = self
                .module_repo
                .update_order_owned(entry.id, user.id, entry.sort_order)
                .await
                .context("Failed to reorder module")?;
            if updated {
                saved += 1;
            } else {
                tracing::debug!(module_id = entry.id, user_id = user.id, "Skipping module order");
            }
        }
        Ok(saved)
    }

    /// Returns the number of contents whose order was written.
    pub async fn reorder_contents(&self, user: &User, order: &OrderMap) -> Result<usize> {
        let mut saved = 0;
        for entry in order.items() {
            let updated = self
                .content_repo
                .update_order_owned(entry.id, user.id, entry.sort_order)
                .await
                .context("Failed to reorder content")?;
            if updated {
                saved += 1;
            } else {
                tracing::debug!(content_id = entry.id, user_id = user.id, "Skipping content order");
            }
        }
        Ok(saved)
    }
}
