//! Message-to-document extraction.
//!
//! [`builder::DocumentBuilder`] drives the other modules: header rules in
//! [`headers`], part selection in [`walker`], text cleanup in [`text`] and
//! date correction in [`date`].

pub mod builder;
pub mod date;
pub mod headers;
pub mod text;
pub mod walker;

pub use builder::DocumentBuilder;
