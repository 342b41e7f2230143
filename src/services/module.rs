//! Module service
//!
//! Modules of a course are edited in bulk, one row per module plus a few
//! blank rows for new ones. A submission is validated as a whole before any
//! row is written.

use crate::db::repositories::{CourseRepository, ModuleRepository};
use crate::models::{
    Course, FormErrors, FormSchema, Module, ModuleFormRow, ModuleFormSet, User, MODULE_FORMSET_EXTRA,
};
use anyhow::Context;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ModuleServiceError {
    #[error("Not found")]
    NotFound,

    #[error("Invalid module data")]
    Validation(FormErrors),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// The module editor of one course
#[derive(Debug, Clone, Serialize)]
pub struct ModuleFormView {
    pub course: Course,
    pub modules: Vec<ModuleFormRow>,
    pub schema: FormSchema,
}

pub struct ModuleService {
    course_repo: Arc<dyn CourseRepository>,
    module_repo: Arc<dyn ModuleRepository>,
}

impl ModuleService {
    pub fn new(course_repo: Arc<dyn CourseRepository>, module_repo: Arc<dyn ModuleRepository>) -> Self {
        Self {
            course_repo,
            module_repo,
        }
    }

    /// Current modules of an owned course followed by blank rows
    pub async fn formset(&self, user: &User, course_id: i64) -> Result<ModuleFormView, ModuleServiceError> {
        let course = self.owned_course(user, course_id).await?;
        let mut modules: Vec<ModuleFormRow> = self
            .module_repo
            .list_by_course(course.id)
            .await
            .context("Failed to list modules")?
            .iter()
            .map(ModuleFormRow::from_module)
            .collect();
        modules.extend(std::iter::repeat_with(ModuleFormRow::default).take(MODULE_FORMSET_EXTRA));

        Ok(ModuleFormView {
            course,
            modules,
            schema: ModuleFormRow::schema(),
        })
    }

    /// Apply a submitted formset and return the course's modules afterwards.
    ///
    /// Rows with an id edit or delete that module, filled rows without an id
    /// append a module, blank rows are ignored. Errors are keyed
    /// `modules.<row>.<field>`.
    pub async fn save_formset(
        &self,
        user: &User,
        course_id: i64,
        formset: ModuleFormSet,
    ) -> Result<Vec<Module>, ModuleServiceError> {
        let course = self.owned_course(user, course_id).await?;
        let existing: HashMap<i64, Module> = self
            .module_repo
            .list_by_course(course.id)
            .await
            .context("Failed to list modules")?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let schema = ModuleFormRow::schema();
        let mut errors = FormErrors::new();
        for (index, row) in formset.modules.iter().enumerate() {
            if row.is_blank() {
                continue;
            }
            let mut row_errors = FormErrors::new();
            if let Some(id) = row.id {
                if !existing.contains_key(&id) {
                    row_errors.add("id", "Select a valid choice. That choice is not one of the available choices.");
                }
            }
            if !row.delete {
                schema.check(&mut row_errors, "title", &row.title);
            }
            errors.extend_prefixed(&format!("modules.{}", index), row_errors);
        }
        errors.into_result().map_err(ModuleServiceError::Validation)?;

        for row in formset.modules {
            if row.is_blank() {
                continue;
            }
            match (row.id.and_then(|id| existing.get(&id)), row.delete) {
                (Some(module), true) => {
                    self.module_repo
                        .delete(module.id, course.id)
                        .await
                        .context("Failed to delete module")?;
                    tracing::info!(module_id = module.id, course_id = course.id, "Module deleted");
                }
                (Some(module), false) => {
                    let title = row.title.trim();
                    if module.title != title || module.description != row.description {
                        let updated = Module {
                            title: title.to_string(),
                            description: row.description,
                            ..module.clone()
                        };
                        self.module_repo
                            .update(&updated)
                            .await
                            .context("Failed to update module")?;
                    }
                }
                // Deleting a row that was never saved.
                (None, true) => {}
                (None, false) => {
                    let module = self
                        .module_repo
                        .create(course.id, row.title.trim(), &row.description)
                        .await
                        .context("Failed to create module")?;
                    tracing::info!(module_id = module.id, course_id = course.id, "Module created");
                }
            }
        }

        let modules = self
            .module_repo
            .list_by_course(course.id)
            .await
            .context("Failed to list modules")?;
        Ok(modules)
    }

    async fn owned_course(&self, user: &User, course_id: i64) -> Result<Course, ModuleServiceError> {
        self.course_repo
            .get_owned(course_id, user.id)
            .await
            .context("Failed to get course")?
            .ok_or(ModuleServiceError::NotFound)
    }
}
