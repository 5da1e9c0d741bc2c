//! MIME tree traversal: decides which parts contribute body text.

use std::borrow::Cow;

use tracing::{debug, warn};

use super::text::TextNormalizer;
use crate::model::message::MessagePart;
use crate::parser::mime::parse_message;

/// Deepest nesting of multiparts and embedded messages that is still walked.
pub const MAX_DEPTH: usize = 10;

const PGP_SIGNED: &str = "-----BEGIN PGP SIGNED MESSAGE-----";
const PGP_SIGNATURE: &str = "-----BEGIN PGP SIGNATURE-----";

/// Walks one message's part tree and feeds the chosen text to a normalizer.
pub struct ContentWalker<'a> {
    default_charset: &'a str,
    normalizer: &'a mut TextNormalizer,
}

impl<'a> ContentWalker<'a> {
    pub fn new(default_charset: &'a str, normalizer: &'a mut TextNormalizer) -> Self {
        Self {
            default_charset,
            normalizer,
        }
    }

    /// Walk from `root`.
    pub fn walk(&mut self, root: &MessagePart) {
        self.walk_part(root, 0);
    }

    fn walk_part(&mut self, part: &MessagePart, depth: usize) {
        if depth > MAX_DEPTH {
            warn!(depth, "MIME structure nested too deeply, ignoring the rest");
            return;
        }
        match part {
            MessagePart::Multipart { subtype, children } => match subtype.as_str() {
                "alternative" => {
                    if let Some(preferred) = preferred_alternative(children) {
                        self.walk_part(preferred, depth + 1);
                    }
                }
                "digest" => {
                    for child in children {
                        match child {
                            MessagePart::Leaf { content, .. } => {
                                self.walk_embedded(content, depth + 1)
                            }
                            MessagePart::Embedded { raw } => self.walk_embedded(raw, depth + 1),
                            MessagePart::Multipart { .. } => {
                                debug!("Multipart inside a digest, skipping")
                            }
                        }
                    }
                }
                _ => {
                    for child in children {
                        self.walk_part(child, depth + 1);
                    }
                }
            },
            MessagePart::Embedded { raw } => self.walk_embedded(raw, depth + 1),
            MessagePart::Leaf {
                charset, content, ..
            } => self.walk_leaf(&part.mime_type(), charset.as_deref(), content, depth),
        }
    }

    fn walk_embedded(&mut self, raw: &[u8], depth: usize) {
        if depth > MAX_DEPTH {
            warn!(depth, "MIME structure nested too deeply, ignoring the rest");
            return;
        }
        match parse_message(raw) {
            Some(inner) => self.walk_part(&inner.root, depth),
            None => debug!(len = raw.len(), "Embedded message could not be parsed"),
        }
    }

    fn walk_leaf(&mut self, mime_type: &str, charset: Option<&str>, content: &[u8], depth: usize) {
        match mime_type {
            "text/plain" => {
                let text = to_utf8(content, charset.unwrap_or(self.default_charset));
                self.normalizer.push_body(strip_pgp_armor(&text));
                self.normalizer.end_part();
            }
            "text/html" => {
                let text = to_utf8(content, charset.unwrap_or(self.default_charset));
                for run in html_text_runs(&text) {
                    self.normalizer.push_body(run);
                }
                self.normalizer.end_part();
            }
            "message/rfc822" => self.walk_embedded(content, depth + 1),
            other => debug!(mime_type = other, "Ignoring part"),
        }
    }
}

/// Pick the child of a `multipart/alternative` that gets indexed: the last
/// multipart or message child, else the last HTML child, else the first
/// plain-text child, else the last child.
pub fn preferred_alternative(children: &[MessagePart]) -> Option<&MessagePart> {
    let types: Vec<String> = children.iter().map(MessagePart::mime_type).collect();
    let pick = |idx: Option<usize>| idx.map(|i| &children[i]);

    pick(
        types
            .iter()
            .rposition(|t| t.starts_with("multipart/") || t.starts_with("message/")),
    )
    .or_else(|| pick(types.iter().rposition(|t| t == "text/html")))
    .or_else(|| pick(types.iter().position(|t| t == "text/plain")))
    .or_else(|| children.last())
}

/// Convert part content to UTF-8.
///
/// Unknown charsets and malformed input fall back to a lossy UTF-8 view of
/// the original bytes.
pub fn to_utf8<'b>(content: &'b [u8], charset: &str) -> Cow<'b, str> {
    let Some(encoding) = encoding_rs::Encoding::for_label(charset.trim().as_bytes()) else {
        debug!(charset, "Unknown charset, using raw bytes");
        return String::from_utf8_lossy(content);
    };
    if encoding == encoding_rs::UTF_8 {
        return String::from_utf8_lossy(content);
    }
    match encoding.decode_without_bom_handling_and_without_replacement(content) {
        Some(text) => text,
        None => {
            debug!(charset, "Charset conversion failed, using raw bytes");
            String::from_utf8_lossy(content)
        }
    }
}

/// Remove clear-sign armor: the header block after the opening line, and
/// everything from the signature block on.
pub fn strip_pgp_armor(text: &str) -> &str {
    let Some(rest) = text.strip_prefix(PGP_SIGNED) else {
        return text;
    };
    let body = match rest.find("\n\n") {
        Some(pos) => &rest[pos + 2..],
        None => rest,
    };
    match body.find(PGP_SIGNATURE) {
        Some(pos) => &body[..pos],
        None => body,
    }
}

/// The text between tags of an HTML document, one run per gap.
pub fn html_text_runs(html: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut begin = 0;
    for (i, c) in html.char_indices() {
        match c {
            '<' => {
                if i > begin {
                    runs.push(&html[begin..i]);
                }
                begin = i + 1;
            }
            '>' => begin = i + 1,
            _ => {}
        }
    }
    if begin < html.len() {
        runs.push(&html[begin..]);
    }
    runs
}
