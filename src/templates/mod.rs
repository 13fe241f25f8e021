//! Reference templates: the in-memory store and the on-disk loader.

pub mod loader;
pub mod store;

pub use loader::{load_directory, save_template, TemplateFile};
pub use store::{TemplateRef, TemplateStore};
