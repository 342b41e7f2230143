//! Module model and the bulk module editor input

use serde::{Deserialize, Serialize};

use super::form::{FieldKind, FormField, FormSchema};

/// An ordered section of a course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: i64,
    #[serde(rename = "course")]
    pub course_id: i64,
    pub title: String,
    pub description: String,
    #[serde(rename = "order")]
    pub sort_order: i32,
}

/// One row of the module formset.
///
/// A row without `id` creates a module, a row with `id` edits that module and
/// `delete` removes it. Rows without `id` whose fields are all empty are the
/// formset's blank extra rows and are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleFormRow {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub delete: bool,
}

impl ModuleFormRow {
    pub fn schema() -> FormSchema {
        FormSchema::new(vec![
            FormField::required("title", FieldKind::Text).max_length(200),
            FormField::optional("description", FieldKind::Textarea),
            FormField::optional("delete", FieldKind::Boolean),
        ])
    }

    pub fn from_module(module: &Module) -> Self {
        Self {
            id: Some(module.id),
            title: module.title.clone(),
            description: module.description.clone(),
            delete: false,
        }
    }

    /// A new row nobody filled in
    pub fn is_blank(&self) -> bool {
        self.id.is_none() && self.title.trim().is_empty() && self.description.trim().is_empty()
    }
}

/// All module rows of a course, submitted together
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleFormSet {
    #[serde(default)]
    pub modules: Vec<ModuleFormRow>,
}

/// Number of blank rows offered for new modules when rendering the formset
pub const MODULE_FORMSET_EXTRA: usize = 2;
