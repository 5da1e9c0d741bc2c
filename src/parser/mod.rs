//! Archive parsing: MBOX framing, header decoding and MIME tree construction.

pub mod header;
pub mod mbox;
pub mod mime;

use crate::error::Result;
use crate::model::message::ParsedMessage;

/// One attempt of the parser to produce a message.
#[derive(Debug, Clone)]
pub struct SourceItem {
    /// Byte offset at which the attempt started.
    pub offset: u64,
    /// `None` when nothing usable could be parsed at `offset`.
    pub message: Option<ParsedMessage>,
}

/// A stream of parsed messages from one archive file.
pub trait MessageSource {
    /// Next parse attempt, `Ok(None)` at end of input.
    fn next_item(&mut self) -> Result<Option<SourceItem>>;

    /// Bytes consumed so far.
    fn bytes_read(&self) -> u64;

    /// Size of the whole input, when known.
    fn total_bytes(&self) -> Option<u64> {
        None
    }
}
