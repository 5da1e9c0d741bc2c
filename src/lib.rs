//! `listindex`: full-text indexer for mailing-list MBOX archives.
//!
//! This crate provides the core library for reading monthly or yearly
//! archive files, turning every message into a searchable document, and
//! storing the documents in tantivy segments keyed by list and period.

pub mod config;
pub mod error;
pub mod extract;
pub mod index;
pub mod model;
pub mod parser;
