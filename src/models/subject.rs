//! Subject model

use serde::{Deserialize, Serialize};

use super::form::{FieldKind, FormField, FormSchema};

/// Top-level course category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

/// Subject annotated with the number of courses filed under it
#[derive(Debug, Clone, Serialize)]
pub struct SubjectWithCount {
    #[serde(flatten)]
    pub subject: Subject,
    pub total_courses: i64,
}

/// Input for creating a subject
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
}

impl SubjectForm {
    pub fn schema() -> FormSchema {
        FormSchema::new(vec![
            FormField::required("title", FieldKind::Text).max_length(200),
            FormField::required("slug", FieldKind::Text).max_length(200),
        ])
    }
}
