//! The normalized search document produced for every archived message.

use chrono::{DateTime, Utc};

/// Upper bound on the display length of author and subject, in bytes.
pub const MAX_HEADER_LENGTH: usize = 80;

/// Upper bound on the stored body snippet, in bytes.
pub const SNIPPET_CAPACITY: usize = 339;

/// Upper bound on the cumulative text handed to the analyzers, in bytes.
pub const MAX_TOKEN_BYTES: usize = 512 * 1024;

/// Indexing channel a piece of text is fed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Free text.
    Body,
    /// Author name, searchable on its own field.
    Author,
    /// Subject text, counted three times within a document.
    Subject,
}

impl Channel {
    /// Within-document weight of the channel.
    pub fn weight(self) -> usize {
        match self {
            Self::Subject => 3,
            Self::Body | Self::Author => 1,
        }
    }
}

/// Text queued for the analyzers, capped at [`MAX_TOKEN_BYTES`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    spans: Vec<(Channel, String)>,
    used: usize,
    truncated: bool,
}

impl TokenStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a span. Once the cap is reached the excess is dropped and a
    /// single warning is logged for the message.
    pub fn push(&mut self, channel: Channel, text: &str) {
        if text.is_empty() {
            return;
        }
        let room = MAX_TOKEN_BYTES.saturating_sub(self.used);
        let kept = if text.len() <= room {
            text
        } else {
            if !self.truncated {
                self.truncated = true;
                tracing::warn!(
                    limit = MAX_TOKEN_BYTES,
                    "Message text exceeds the indexing limit, truncating"
                );
            }
            &text[..floor_char_boundary(text, room)]
        };
        if kept.is_empty() {
            return;
        }
        self.used += kept.len();
        self.spans.push((channel, kept.to_string()));
    }

    /// All spans of one channel joined by a single space.
    pub fn text(&self, channel: Channel) -> String {
        self.spans
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, t)| t.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn spans(&self) -> &[(Channel, String)] {
        &self.spans
    }

    /// Total bytes accepted so far.
    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Whether anything was dropped.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// How the stored date of a [`Document`] relates to the date it carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateCorrection {
    /// Inside the bucket or its grace period.
    #[default]
    Kept,
    /// No parseable date; the bucket start was used.
    Missing,
    /// Clamped forward to the bucket start.
    TooEarly,
    /// Clamped back to the last second of the bucket.
    TooLate,
}

impl DateCorrection {
    pub fn is_corrected(self) -> bool {
        self != Self::Kept
    }
}

/// One message, ready for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub author: String,
    pub email: String,
    pub subject: String,
    /// Corrected, always inside the bucket grace window.
    pub date: DateTime<Utc>,
    pub date_correction: DateCorrection,
    /// Display snippet, at most [`SNIPPET_CAPACITY`] bytes.
    pub body: String,
    pub tokens: TokenStream,
}

/// Largest index `<= max` that lies on a char boundary of `s`.
pub fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Cut `s` to at most `max` bytes without splitting a character.
pub fn truncate_bytes(s: &str, max: usize) -> String {
    s[..floor_char_boundary(s, max)].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_stream_by_channel() {
        let mut ts = TokenStream::new();
        ts.push(Channel::Body, "hello");
        ts.push(Channel::Author, "Joey Hess");
        ts.push(Channel::Body, "world");
        assert_eq!(ts.text(Channel::Body), "hello world");
        assert_eq!(ts.text(Channel::Author), "Joey Hess");
        assert_eq!(ts.text(Channel::Subject), "");
        assert_eq!(ts.len(), 19);
    }

    #[test]
    fn test_token_stream_saturates() {
        let mut ts = TokenStream::new();
        let chunk = "x".repeat(300 * 1024);
        ts.push(Channel::Body, &chunk);
        ts.push(Channel::Body, &chunk);
        ts.push(Channel::Body, "more");
        assert_eq!(ts.len(), MAX_TOKEN_BYTES);
        assert!(ts.is_truncated());
        assert_eq!(ts.spans().len(), 2);
    }

    #[test]
    fn test_truncate_never_splits_chars() {
        assert_eq!(truncate_bytes("héllo", 2), "h");
        assert_eq!(truncate_bytes("héllo", 3), "hé");
        assert_eq!(truncate_bytes("abc", 80), "abc");
    }

    #[test]
    fn test_channel_weights() {
        assert_eq!(Channel::Subject.weight(), 3);
        assert_eq!(Channel::Author.weight(), 1);
        assert_eq!(Channel::Body.weight(), 1);
    }
}
