//! MIME parsing: turns one raw message into a [`ParsedMessage`] tree.
//!
//! The byte-level grammar is left to `mail-parser`; this module only maps
//! its flat part list onto the closed [`MessagePart`] enum.

use base64::Engine as _;
use mail_parser::{MessageParser, MimeHeaders, PartType};

use super::header::{decode_header_bytes, unfold_headers, LENIENT_BASE64};
use crate::model::message::{MessagePart, ParsedMessage};

/// Parse a raw message (an optional mbox `From ` line, headers and body).
///
/// Returns `None` when there is nothing that looks like a message.
pub fn parse_message(raw_message: &[u8]) -> Option<ParsedMessage> {
    let message_bytes = skip_from_line(raw_message);
    if message_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return None;
    }

    let parsed = MessageParser::default().parse(message_bytes)?;

    let header_end = find_header_end(message_bytes).unwrap_or(message_bytes.len());
    let raw_headers = decode_header_bytes(&message_bytes[..header_end]);
    let headers = unfold_headers(&raw_headers);

    let root = convert_part(&parsed, 0, false);
    Some(ParsedMessage {
        headers,
        raw_headers,
        root,
    })
}

/// Map part `id` of `msg` (and its children) onto a [`MessagePart`].
fn convert_part(msg: &mail_parser::Message<'_>, id: usize, in_digest: bool) -> MessagePart {
    let Some(part) = msg.parts.get(id) else {
        return MessagePart::Leaf {
            content_type: None,
            charset: None,
            content: Vec::new(),
        };
    };

    let declared = part.content_type().map(|ct| match ct.subtype() {
        Some(sub) => format!("{}/{}", ct.ctype(), sub),
        None => ct.ctype().to_string(),
    });
    let charset = part
        .content_type()
        .and_then(|ct| ct.attribute("charset"))
        .map(str::to_string);

    match &part.body {
        PartType::Multipart(children) => {
            let subtype = part
                .content_type()
                .and_then(|ct| ct.subtype())
                .unwrap_or("mixed")
                .to_ascii_lowercase();
            let digest = subtype == "digest";
            MessagePart::Multipart {
                children: children
                    .iter()
                    .map(|&child| convert_part(msg, child, digest))
                    .collect(),
                subtype,
            }
        }
        PartType::Message(nested) => MessagePart::Embedded {
            raw: nested.raw_message.to_vec(),
        },
        // Digest entries are whole messages even without a declared type.
        _ if in_digest => MessagePart::Embedded {
            raw: raw_slice(msg, part.offset_header as usize, part.offset_end as usize),
        },
        // mail-parser has already converted text with a declared charset.
        PartType::Text(text) | PartType::Html(text) if charset.is_some() => MessagePart::Leaf {
            content_type: declared,
            charset: Some("utf-8".to_string()),
            content: text.as_bytes().to_vec(),
        },
        // Without one the bytes are kept so the caller's default charset applies.
        PartType::Text(_) | PartType::Html(_) => MessagePart::Leaf {
            content_type: declared,
            charset: None,
            content: decode_transfer(
                part.content_transfer_encoding(),
                &raw_slice(msg, part.offset_body as usize, part.offset_end as usize),
            ),
        },
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => MessagePart::Leaf {
            content_type: declared,
            charset,
            content: bytes.to_vec(),
        },
    }
}

fn raw_slice(msg: &mail_parser::Message<'_>, start: usize, end: usize) -> Vec<u8> {
    let raw = msg.raw_message.as_ref();
    let end = end.min(raw.len());
    raw.get(start.min(end)..end).unwrap_or_default().to_vec()
}

/// Undo a `Content-Transfer-Encoding`. Unknown encodings pass through.
fn decode_transfer(encoding: Option<&str>, body: &[u8]) -> Vec<u8> {
    match encoding.map(|e| e.trim().to_ascii_lowercase()).as_deref() {
        Some("base64") => {
            let compact: Vec<u8> = body
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            LENIENT_BASE64
                .decode(compact)
                .unwrap_or_else(|_| body.to_vec())
        }
        Some("quoted-printable") => decode_quoted_printable(body),
        _ => body.to_vec(),
    }
}

/// Quoted-printable body decoding: `=XX` escapes and soft line breaks.
fn decode_quoted_printable(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        if body[i] != b'=' {
            out.push(body[i]);
            i += 1;
            continue;
        }
        let rest = &body[i + 1..];
        if rest.starts_with(b"\r\n") {
            i += 3;
        } else if rest.starts_with(b"\n") {
            i += 2;
        } else if let Some(byte) = rest
            .get(..2)
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok())
        {
            out.push(byte);
            i += 3;
        } else {
            out.push(b'=');
            i += 1;
        }
    }
    out
}

/// Skip the `From ` separator line at the start of MBOX messages.
pub fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Byte offset of the blank line that ends the header block.
fn find_header_end(data: &[u8]) -> Option<usize> {
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some(i);
        }
        if data[i..].starts_with(b"\r\n\r\n") {
            return Some(i);
        }
    }
    None
}
