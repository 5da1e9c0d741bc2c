//! Parsed message tree handed over by the MIME parser.

/// One node of a parsed MIME tree.
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePart {
    /// A single body part.
    Leaf {
        /// Declared `type/subtype`, if any.
        content_type: Option<String>,
        /// Declared charset, if any. `utf-8` when the parser already decoded it.
        charset: Option<String>,
        /// Transfer-decoded content.
        content: Vec<u8>,
    },
    /// A `multipart/*` container.
    Multipart {
        /// Lowercased subtype (`mixed`, `alternative`, `digest`, ...).
        subtype: String,
        children: Vec<MessagePart>,
    },
    /// A nested `message/rfc822` body, kept raw and re-parsed when walked.
    Embedded { raw: Vec<u8> },
}

impl MessagePart {
    /// Convenience constructor for a text leaf already in UTF-8.
    pub fn text(content_type: &str, content: &str) -> Self {
        Self::Leaf {
            content_type: Some(content_type.to_string()),
            charset: Some("utf-8".to_string()),
            content: content.as_bytes().to_vec(),
        }
    }

    /// Lowercased `type/subtype` of this node, `text/plain` when undeclared.
    pub fn mime_type(&self) -> String {
        match self {
            Self::Leaf { content_type, .. } => content_type
                .as_deref()
                .map(normalize_mime_type)
                .unwrap_or_else(|| "text/plain".to_string()),
            Self::Multipart { subtype, .. } => format!("multipart/{subtype}"),
            Self::Embedded { .. } => "message/rfc822".to_string(),
        }
    }
}

/// A message as delivered by the parser: headers plus the root part.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    /// `(lowercase_name, unfolded_value)` pairs in header order.
    pub headers: Vec<(String, String)>,
    /// The raw header block as text, used to synthesize identities.
    pub raw_headers: String,
    /// Root of the MIME tree.
    pub root: MessagePart,
}

impl ParsedMessage {
    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Lowercase a `type/subtype` string, falling back to `text/plain` when it
/// lacks either half.
pub fn normalize_mime_type(raw: &str) -> String {
    let essence = raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.split_once('/') {
        Some((t, s)) if !t.is_empty() && !s.is_empty() => essence,
        _ => "text/plain".to_string(),
    }
}
