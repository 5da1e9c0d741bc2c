//! Core data model: parsed messages, sender addresses, archive buckets and
//! the documents handed to storage.

pub mod address;
pub mod bucket;
pub mod document;
pub mod message;

pub use address::Address;
pub use bucket::{Bucket, Period};
pub use document::{Channel, Document, TokenStream};
pub use message::{MessagePart, ParsedMessage};
