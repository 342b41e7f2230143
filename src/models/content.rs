//! Content model
//!
//! A [`Content`] row places one item at a position inside a module. Items are
//! a closed set of kinds, each stored in its own table with a single payload
//! column; [`ItemKind`] is the dispatch table from the URL tag to that storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::form::{FieldKind, FormField, FormSchema};

/// Kind of a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Text,
    Video,
    Image,
    File,
}

impl ItemKind {
    pub const ALL: [ItemKind; 4] = [ItemKind::Text, ItemKind::Video, ItemKind::Image, ItemKind::File];

    /// Resolve a URL tag. Unknown tags resolve to `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "text" => Some(ItemKind::Text),
            "video" => Some(ItemKind::Video),
            "image" => Some(ItemKind::Image),
            "file" => Some(ItemKind::File),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            ItemKind::Text => "text",
            ItemKind::Video => "video",
            ItemKind::Image => "image",
            ItemKind::File => "file",
        }
    }

    /// Table holding items of this kind
    pub fn table(self) -> &'static str {
        match self {
            ItemKind::Text => "text_items",
            ItemKind::Video => "video_items",
            ItemKind::Image => "image_items",
            ItemKind::File => "file_items",
        }
    }

    /// Name of the payload field, both as column and as form field
    pub fn payload_column(self) -> &'static str {
        match self {
            ItemKind::Text => "content",
            ItemKind::Video => "url",
            ItemKind::Image | ItemKind::File => "file",
        }
    }

    /// Editable fields. Owner, order and timestamps are managed by the server.
    pub fn form_schema(self) -> FormSchema {
        let payload = match self {
            ItemKind::Text => FormField::required("content", FieldKind::Textarea),
            ItemKind::Video => FormField::required("url", FieldKind::Url).max_length(500),
            ItemKind::Image | ItemKind::File => {
                FormField::required("file", FieldKind::File).max_length(500)
            }
        };
        FormSchema::new(vec![
            FormField::required("title", FieldKind::Text).max_length(250),
            payload,
        ])
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Kind-specific item data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemPayload {
    Text { content: String },
    Video { url: String },
    Image { file: String },
    File { file: String },
}

impl ItemPayload {
    /// Build the payload of `kind` from its stored column value
    pub fn from_parts(kind: ItemKind, value: String) -> Self {
        match kind {
            ItemKind::Text => ItemPayload::Text { content: value },
            ItemKind::Video => ItemPayload::Video { url: value },
            ItemKind::Image => ItemPayload::Image { file: value },
            ItemKind::File => ItemPayload::File { file: value },
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            ItemPayload::Text { .. } => ItemKind::Text,
            ItemPayload::Video { .. } => ItemKind::Video,
            ItemPayload::Image { .. } => ItemKind::Image,
            ItemPayload::File { .. } => ItemKind::File,
        }
    }

    /// Value of the payload column
    pub fn value(&self) -> &str {
        match self {
            ItemPayload::Text { content } => content,
            ItemPayload::Video { url } => url,
            ItemPayload::Image { file } | ItemPayload::File { file } => file,
        }
    }
}

/// A content item of any kind
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: i64,
    #[serde(rename = "owner")]
    pub owner_id: i64,
    pub title: String,
    #[serde(flatten)]
    pub payload: ItemPayload,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updated")]
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        self.payload.kind()
    }
}

/// Position of an item inside a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Content {
    pub id: i64,
    #[serde(rename = "module")]
    pub module_id: i64,
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub item_type: ItemKind,
    pub item_id: i64,
}

/// Content row joined with its item
#[derive(Debug, Clone, Serialize)]
pub struct ContentWithItem {
    pub id: i64,
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub item: Item,
}

/// Submitted item fields. Only the payload field of the item's kind is read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemForm {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl ItemForm {
    /// Initial values for editing an existing item
    pub fn from_item(item: &Item) -> Self {
        let mut form = Self {
            title: item.title.clone(),
            ..Default::default()
        };
        let value = Some(item.payload.value().to_string());
        match item.kind() {
            ItemKind::Text => form.content = value,
            ItemKind::Video => form.url = value,
            ItemKind::Image | ItemKind::File => form.file = value,
        }
        form
    }

    /// Raw payload value for `kind`, empty when absent
    pub fn payload_value(&self, kind: ItemKind) -> &str {
        let value = match kind {
            ItemKind::Text => &self.content,
            ItemKind::Video => &self.url,
            ItemKind::Image | ItemKind::File => &self.file,
        };
        value.as_deref().unwrap_or("")
    }
}
