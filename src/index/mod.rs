//! Segment storage and the indexing controller.

pub mod catalog;
pub mod controller;
pub mod discover;
pub mod format;
pub mod language;
pub mod spam;
pub mod store;
pub mod tantivy_store;

pub use controller::{IndexController, IndexOptions, RunSummary};
pub use discover::discover_archives;
pub use language::IndexLanguage;
pub use tantivy_store::TantivyStorage;
