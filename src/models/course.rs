//! Course model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::form::{FieldKind, FormField, FormSchema};
use super::module::Module;
use super::subject::{Subject, SubjectWithCount};

/// A course authored by one instructor, filed under a subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    #[serde(rename = "owner")]
    pub owner_id: i64,
    #[serde(rename = "subject")]
    pub subject_id: i64,
    pub title: String,
    pub slug: String,
    pub overview: String,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
}

/// Course annotated with its module count, as shown in the catalog
#[derive(Debug, Clone, Serialize)]
pub struct CourseWithCount {
    #[serde(flatten)]
    pub course: Course,
    pub total_modules: i64,
}

/// Course with its ordered modules and enrollment count
#[derive(Debug, Clone, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub modules: Vec<Module>,
    pub total_students: i64,
}

/// Catalog listing, optionally narrowed to one subject
#[derive(Debug, Clone, Serialize)]
pub struct CatalogListing {
    pub subjects: Vec<SubjectWithCount>,
    pub subject: Option<Subject>,
    pub courses: Vec<CourseWithCount>,
}

/// Submitted course fields.
///
/// Every field defaults so that a missing value surfaces as a field error
/// instead of a body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseForm {
    #[serde(default)]
    pub subject: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub overview: String,
}

impl CourseForm {
    pub fn schema() -> FormSchema {
        FormSchema::new(vec![
            FormField::required("subject", FieldKind::Select),
            FormField::required("title", FieldKind::Text).max_length(200),
            FormField::required("slug", FieldKind::Text).max_length(200),
            FormField::optional("overview", FieldKind::Textarea),
        ])
    }

    /// Initial values for editing an existing course
    pub fn from_course(course: &Course) -> Self {
        Self {
            subject: Some(course.subject_id),
            title: course.title.clone(),
            slug: course.slug.clone(),
            overview: course.overview.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course() -> Course {
        Course {
            id: 3,
            owner_id: 1,
            subject_id: 2,
            title: "Web apps by example".to_string(),
            slug: "web-apps-by-example".to_string(),
            overview: "Build web apps".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_course_json_fields() {
        let json = serde_json::to_value(course()).unwrap();
        for field in ["id", "subject", "title", "slug", "overview", "created", "owner"] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["owner"], 1);
        assert_eq!(json["subject"], 2);
    }

    #[test]
    fn test_course_detail_flattens() {
        let detail = CourseDetail {
            course: course(),
            modules: vec![],
            total_students: 4,
        };
        let json = serde_json::to_value(detail).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["total_students"], 4);
        assert!(json["modules"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_form_defaults_missing_fields() {
        let form: CourseForm = serde_json::from_str(r#"{"title": "Rust"}"#).unwrap();
        assert_eq!(form.subject, None);
        assert_eq!(form.title, "Rust");
        assert!(form.slug.is_empty());
    }

    #[test]
    fn test_form_from_course() {
        let form = CourseForm::from_course(&course());
        assert_eq!(form.subject, Some(2));
        assert_eq!(form.slug, "web-apps-by-example");
    }
}
