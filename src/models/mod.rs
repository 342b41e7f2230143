//! Data models
//!
//! Database entities (User, Session, Subject, Course, Module, Content, Item),
//! form inputs with their field schemas, and view types returned by the API.

mod content;
mod course;
mod form;
mod module;
mod order;
mod session;
mod subject;
mod user;

pub use content::{Content, ContentWithItem, Item, ItemForm, ItemKind, ItemPayload};
pub use course::{CatalogListing, Course, CourseDetail, CourseForm, CourseWithCount};
pub use form::{FieldKind, FormErrors, FormField, FormSchema};
pub use module::{Module, ModuleFormRow, ModuleFormSet, MODULE_FORMSET_EXTRA};
pub use order::{OrderItem, OrderMap};
pub use session::Session;
pub use subject::{Subject, SubjectForm, SubjectWithCount};
pub use user::{CreateUserInput, User, UserRole};
