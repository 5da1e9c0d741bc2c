//! Body text normalization.
//!
//! Body text arrives as spans: a whole plain-text part, or the runs between
//! the tags of an HTML part. Runs of one part are continuous text, so the
//! snippet cleaner keeps its line and punctuation state across them and only
//! resets at [`TextNormalizer::end_part`]. A fresh [`TextNormalizer`] is
//! created per message.

use crate::model::document::{Channel, TokenStream, SNIPPET_CAPACITY};

/// Longest run of one repeated punctuation character kept verbatim.
const MAX_PUNCT_RUN: usize = 3;

/// Normalize one self-contained piece of body text.
///
/// The text starts at the beginning of a line. Lines starting with `>` are
/// dropped together with their line break. Whitespace runs collapse to a
/// single space and runs of identical non-alphanumeric characters are cut to
/// three. Leading and trailing whitespace is removed.
pub fn clean_span(span: &str) -> String {
    let mut buffer = SnippetBuffer::new(usize::MAX);
    buffer.push(span);
    buffer.finish()
}

/// Display snippet that cleans text as it arrives and saturates at a fixed
/// byte capacity.
#[derive(Debug, Clone)]
pub struct SnippetBuffer {
    text: String,
    capacity: usize,
    full: bool,
    at_line_start: bool,
    in_quote: bool,
    pending_space: bool,
    run_char: char,
    run_len: usize,
}

impl SnippetBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            text: String::new(),
            capacity,
            full: false,
            at_line_start: true,
            in_quote: false,
            pending_space: false,
            run_char: '\0',
            run_len: 0,
        }
    }

    /// Clean `span` and append it, continuing the text pushed before.
    /// Characters that would cross the capacity are dropped along with
    /// everything after them.
    pub fn push(&mut self, span: &str) {
        for c in span.chars() {
            if self.full {
                return;
            }
            if self.at_line_start && c == '>' {
                self.in_quote = true;
            }
            self.at_line_start = c == '\n';
            if self.in_quote {
                if c == '\n' {
                    self.in_quote = false;
                }
                continue;
            }

            if c.is_whitespace() {
                self.pending_space = !self.text.is_empty();
                self.run_len = 0;
                continue;
            }

            if !c.is_alphanumeric() && c == self.run_char && !self.pending_space {
                if self.run_len >= MAX_PUNCT_RUN {
                    continue;
                }
                self.run_len += 1;
            } else {
                self.run_char = c;
                self.run_len = 1;
            }

            if self.pending_space {
                if !self.append(' ') {
                    return;
                }
                self.pending_space = false;
            }
            self.append(c);
        }
    }

    /// Close the current part: the next text starts on a fresh line and is
    /// separated from this one by a space.
    pub fn end_part(&mut self) {
        self.pending_space = !self.text.is_empty();
        self.at_line_start = true;
        self.in_quote = false;
        self.run_char = '\0';
        self.run_len = 0;
    }

    fn append(&mut self, c: char) -> bool {
        if self.text.len() + c.len_utf8() > self.capacity {
            self.full = true;
            return false;
        }
        self.text.push(c);
        true
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn finish(self) -> String {
        self.text
    }
}

impl Default for SnippetBuffer {
    fn default() -> Self {
        Self::new(SNIPPET_CAPACITY)
    }
}

/// Per-message accumulator for indexable text and the display snippet.
#[derive(Debug, Default)]
pub struct TextNormalizer {
    snippet: SnippetBuffer,
    tokens: TokenStream,
    part: String,
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one span of body text. The analyzers see the text as written,
    /// quoted lines included; only the snippet is cleaned.
    pub fn push_body(&mut self, span: &str) {
        self.part.push_str(span);
        self.snippet.push(span);
    }

    /// Mark the end of one body part.
    pub fn end_part(&mut self) {
        if !self.part.is_empty() {
            let text = std::mem::take(&mut self.part);
            self.tokens.push(Channel::Body, &text);
        }
        self.snippet.end_part();
    }

    /// Feed header text on its own channel. Headers never reach the snippet.
    pub fn push_header(&mut self, channel: Channel, text: &str) {
        self.tokens.push(channel, text);
    }

    /// Consume the normalizer, returning `(snippet, tokens)`.
    pub fn finish(mut self) -> (String, TokenStream) {
        self.end_part();
        (self.snippet.finish(), self.tokens)
    }
}
