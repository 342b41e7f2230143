//! Content authoring
//!
//! Instructors attach items of any [`ItemKind`] to their modules. The item
//! kind comes from the URL; the editable fields and their checks come from
//! [`ItemKind::form_schema`] plus a kind-specific payload check.

use crate::db::repositories::{ContentRepository, ItemRepository, ModuleRepository};
use crate::models::{
    Content, ContentWithItem, FormErrors, FormSchema, Item, ItemForm, ItemKind, ItemPayload, Module, User,
};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[A-Za-z0-9.-]+(:\d+)?(/\S*)?$").expect("valid url regex"));

/// File extensions accepted for image items
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, thiserror::Error)]
pub enum ContentServiceError {
    #[error("Not found")]
    NotFound,

    #[error("Invalid content data")]
    Validation(FormErrors),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Edit form of a new or existing item in a module
#[derive(Debug, Clone, Serialize)]
pub struct ContentFormView {
    pub module: Module,
    pub kind: ItemKind,
    pub item: Option<Item>,
    pub form: ItemForm,
    pub schema: FormSchema,
}

/// A module with its contents in order
#[derive(Debug, Clone, Serialize)]
pub struct ModuleContents {
    pub module: Module,
    pub contents: Vec<ContentWithItem>,
}

pub struct ContentService {
    module_repo: Arc<dyn ModuleRepository>,
    content_repo: Arc<dyn ContentRepository>,
    item_repo: Arc<dyn ItemRepository>,
    upload_prefix: String,
}

impl ContentService {
    /// `upload_prefix` is the URL path uploaded files are served under; image
    /// and file items must point below it.
    pub fn new(
        module_repo: Arc<dyn ModuleRepository>,
        content_repo: Arc<dyn ContentRepository>,
        item_repo: Arc<dyn ItemRepository>,
        upload_prefix: impl Into<String>,
    ) -> Self {
        Self {
            module_repo,
            content_repo,
            item_repo,
            upload_prefix: upload_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn get_content_form(
        &self,
        user: &User,
        module_id: i64,
        kind: ItemKind,
        item_id: Option<i64>,
    ) -> Result<ContentFormView, ContentServiceError> {
        let module = self.owned_module(user, module_id).await?;
        let item = match item_id {
            Some(id) => Some(self.owned_item(user, kind, id).await?),
            None => None,
        };
        Ok(ContentFormView {
            module,
            kind,
            form: item.as_ref().map(ItemForm::from_item).unwrap_or_default(),
            item,
            schema: kind.form_schema(),
        })
    }

    /// Create or update an item in an owned module.
    ///
    /// A new item (no `item_id`) is appended to the module's contents. On a
    /// validation error nothing is written.
    pub async fn save_content(
        &self,
        user: &User,
        module_id: i64,
        kind: ItemKind,
        item_id: Option<i64>,
        form: ItemForm,
    ) -> Result<Item, ContentServiceError> {
        let module = self.owned_module(user, module_id).await?;
        if let Some(id) = item_id {
            self.owned_item(user, kind, id).await?;
        }

        let payload = self.validate(kind, &form)?;
        let title = form.title.trim();

        match item_id {
            Some(id) => {
                let updated = self
                    .item_repo
                    .update_owned(id, user.id, title, &payload)
                    .await
                    .context("Failed to update item")?;
                if !updated {
                    return Err(ContentServiceError::NotFound);
                }
                tracing::info!(item_id = id, kind = %kind, owner_id = user.id, "Item updated");
                self.owned_item(user, kind, id).await
            }
            None => {
                let item = self
                    .item_repo
                    .create(user.id, title, &payload)
                    .await
                    .context("Failed to create item")?;
                let content = self
                    .content_repo
                    .create(module.id, kind, item.id)
                    .await
                    .context("Failed to create content")?;
                tracing::info!(
                    content_id = content.id,
                    item_id = item.id,
                    kind = %kind,
                    module_id = module.id,
                    "Content created"
                );
                Ok(item)
            }
        }
    }

    /// Delete an owned content together with its item. Returns the content's module id.
    pub async fn delete_content(&self, user: &User, content_id: i64) -> Result<i64, ContentServiceError> {
        let content = self
            .content_repo
            .get_owned(content_id, user.id)
            .await
            .context("Failed to get content")?
            .ok_or(ContentServiceError::NotFound)?;
        let deleted = self
            .content_repo
            .delete_with_item(content.id, user.id)
            .await
            .context("Failed to delete content")?;
        if !deleted {
            return Err(ContentServiceError::NotFound);
        }
        tracing::info!(content_id, module_id = content.module_id, "Content deleted");
        Ok(content.module_id)
    }

    /// An owned module with its contents and their items
    pub async fn module_contents(&self, user: &User, module_id: i64) -> Result<ModuleContents, ContentServiceError> {
        let module = self.owned_module(user, module_id).await?;
        let contents = self.contents_with_items(module.id).await?;
        Ok(ModuleContents { module, contents })
    }

    /// Contents of any module with their items, without an ownership check
    pub async fn contents_with_items(&self, module_id: i64) -> Result<Vec<ContentWithItem>, ContentServiceError> {
        let contents = self
            .content_repo
            .list_by_module(module_id)
            .await
            .context("Failed to list contents")?;
        let mut resolved = Vec::with_capacity(contents.len());
        for content in contents {
            match self.resolve(&content).await? {
                Some(item) => resolved.push(ContentWithItem {
                    id: content.id,
                    sort_order: content.sort_order,
                    item,
                }),
                None => tracing::warn!(content_id = content.id, item_id = content.item_id, "Content item missing"),
            }
        }
        Ok(resolved)
    }

    async fn resolve(&self, content: &Content) -> Result<Option<Item>, ContentServiceError> {
        let item = self
            .item_repo
            .get(content.item_type, content.item_id)
            .await
            .context("Failed to get content item")?;
        Ok(item)
    }

    async fn owned_module(&self, user: &User, module_id: i64) -> Result<Module, ContentServiceError> {
        self.module_repo
            .get_owned(module_id, user.id)
            .await
            .context("Failed to get module")?
            .ok_or(ContentServiceError::NotFound)
    }

    async fn owned_item(&self, user: &User, kind: ItemKind, id: i64) -> Result<Item, ContentServiceError> {
        self.item_repo
            .get_owned(kind, id, user.id)
            .await
            .context("Failed to get item")?
            .ok_or(ContentServiceError::NotFound)
    }

    fn validate(&self, kind: ItemKind, form: &ItemForm) -> Result<ItemPayload, ContentServiceError> {
        let schema = kind.form_schema();
        let field = kind.payload_column();
        let value = form.payload_value(kind).trim();
        let mut errors = FormErrors::new();

        schema.check(&mut errors, "title", &form.title);
        schema.check(&mut errors, field, value);

        if errors.get(field).is_none() {
            match kind {
                ItemKind::Text => {}
                ItemKind::Video => {
                    if !URL_RE.is_match(value) {
                        errors.add(field, "Enter a valid URL.");
                    }
                }
                ItemKind::Image | ItemKind::File => {
                    if !self.is_upload_path(value) {
                        errors.add(field, "Upload the file first and submit the path it was stored under.");
                    } else if kind == ItemKind::Image && !has_image_extension(value) {
                        errors.add(
                            field,
                            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
                        );
                    }
                }
            }
        }

        errors.into_result().map_err(ContentServiceError::Validation)?;
        Ok(ItemPayload::from_parts(kind, value.to_string()))
    }

    fn is_upload_path(&self, path: &str) -> bool {
        path.strip_prefix(&self.upload_prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .is_some_and(|name| !name.is_empty() && !name.split('/').any(|part| part == ".." || part.is_empty()))
    }
}

fn has_image_extension(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
