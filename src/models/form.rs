//! Form description and validation error types
//!
//! Editable resources describe their fields as a [`FormSchema`] so clients can
//! build an edit form, and report rejected submissions as [`FormErrors`].

use serde::Serialize;
use std::collections::BTreeMap;

/// Input widget type of a form field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Textarea,
    Url,
    File,
    /// Foreign key chosen from a list
    Select,
    Boolean,
}

/// One editable field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl FormField {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            max_length: None,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            max_length: None,
        }
    }

    pub const fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }
}

/// Ordered list of the fields a client may submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormSchema {
    pub fields: Vec<FormField>,
}

impl FormSchema {
    pub fn new(fields: Vec<FormField>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check required and max-length constraints for a field value.
    pub fn check(&self, errors: &mut FormErrors, name: &str, value: &str) {
        let Some(field) = self.field(name) else {
            return;
        };
        if field.required && value.trim().is_empty() {
            errors.add(name, "This field is required.");
            return;
        }
        if let Some(max) = field.max_length {
            let len = value.chars().count();
            if len > max {
                errors.add(
                    name,
                    format!(
                        "Ensure this value has at most {} characters (it has {}).",
                        max, len
                    ),
                );
            }
        }
    }
}

/// Field name to error messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Merge another error set, prefixing its field names.
    pub fn extend_prefixed(&mut self, prefix: &str, other: FormErrors) {
        for (field, messages) in other.0 {
            self.0
                .entry(format!("{}.{}", prefix, field))
                .or_default()
                .extend(messages);
        }
    }

    /// `Ok(())` when no errors were recorded
    pub fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FormSchema {
        FormSchema::new(vec![
            FormField::required("title", FieldKind::Text).max_length(5),
            FormField::optional("description", FieldKind::Textarea),
        ])
    }

    #[test]
    fn test_required_field() {
        let mut errors = FormErrors::new();
        schema().check(&mut errors, "title", "   ");
        assert_eq!(errors.get("title").unwrap(), ["This field is required."]);
    }

    #[test]
    fn test_max_length() {
        let mut errors = FormErrors::new();
        schema().check(&mut errors, "title", "toolong");
        assert!(errors.get("title").unwrap()[0].contains("at most 5"));

        let mut errors = FormErrors::new();
        schema().check(&mut errors, "title", "héllo");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_optional_field_accepts_empty() {
        let mut errors = FormErrors::new();
        schema().check(&mut errors, "description", "");
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn test_extend_prefixed() {
        let mut row = FormErrors::new();
        row.add("title", "bad");
        let mut all = FormErrors::new();
        all.extend_prefixed("modules[2]", row);

        let json = serde_json::to_value(&all).unwrap();
        assert_eq!(json, serde_json::json!({"modules[2].title": ["bad"]}));
    }

    #[test]
    fn test_schema_serialization() {
        let json = serde_json::to_value(schema()).unwrap();
        assert_eq!(json["fields"][0]["name"], "title");
        assert_eq!(json["fields"][0]["kind"], "text");
        assert_eq!(json["fields"][0]["max_length"], 5);
        assert!(json["fields"][1].get("max_length").is_none());
    }
}
