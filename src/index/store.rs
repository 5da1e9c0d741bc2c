//! Storage seam between the indexing controller and the search engine.

use std::path::{Path, PathBuf};

use super::format::DocumentRecord;
use super::language::IndexLanguage;
use crate::error::Result;

/// A collection of segments sharing one path prefix.
pub trait Storage {
    type Segment: Segment;

    /// Existing segment paths (`<prefix>*`), in a stable order.
    fn segment_paths(&self) -> Result<Vec<PathBuf>>;

    /// Path of overflow segment `ordinal` (`<prefix>-NNN`).
    fn overflow_path(&self, ordinal: u32) -> PathBuf;

    /// Open a segment for writing, creating it if needed. It starts out
    /// with the storage's default language.
    fn open(&self, path: &Path) -> Result<Self::Segment>;
}

/// One writable segment.
pub trait Segment {
    fn path(&self) -> &Path;

    /// Number of live documents, pending writes included once flushed.
    fn doc_count(&self) -> Result<u64>;

    /// Language whose analyzer new documents go through.
    fn language(&self) -> &IndexLanguage;

    /// Switch the analyzer for documents added from now on. Documents not
    /// yet flushed may still pick up the new one.
    fn set_language(&mut self, language: &IndexLanguage) -> Result<()>;

    /// Raw terms of live documents that start with `prefix`.
    fn terms_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Store `record`, replacing any document with the same key.
    fn replace(&mut self, record: DocumentRecord) -> Result<()>;

    /// Delete every document carrying `term` (a key or a bucket term).
    fn delete_term(&mut self, term: &str) -> Result<()>;

    /// Make all pending changes durable.
    fn flush(&mut self) -> Result<()>;
}
