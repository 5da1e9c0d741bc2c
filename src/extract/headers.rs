//! Header decoding rules for subjects and senders.

use tracing::debug;

use crate::model::address::Address;
use crate::model::document::{truncate_bytes, MAX_HEADER_LENGTH};
use crate::parser::header::decode_encoded_words;

/// Opening and closing characters stripped in matching pairs from author
/// names, position for position.
const DECORATION_OPEN: &str = "(<-=*{[_\"%'.!:@^$|+";
const DECORATION_CLOSE: &str = ")>-=*}]_\"%'.!:@^$|+";

/// Relay domain appended to addresses by gmane.
const GMANE_DOMAIN: &str = "public.gmane.org";

/// Upper bound on decode passes inside the author loop.
const MAX_DECODE_PASSES: usize = 8;

/// Author and address of a message's sender, uncapped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    pub author: String,
    pub email: String,
}

/// Clean a raw `Subject` value: drop every leading `re:` (with the
/// whitespace after it) and decode encoded words. Idempotent.
pub fn clean_subject(raw: &str) -> String {
    let stripped = strip_reply_prefixes(raw);
    let decoded = decode_encoded_words(stripped);
    strip_reply_prefixes(&decoded).to_string()
}

fn strip_reply_prefixes(s: &str) -> &str {
    let mut rest = s.trim_start();
    while rest.len() >= 3 && rest.as_bytes()[..3].eq_ignore_ascii_case(b"re:") {
        rest = rest[3..].trim_start();
    }
    rest
}

/// Cut a header value to the display limit without splitting a character.
pub fn cap_header(s: &str) -> String {
    truncate_bytes(s, MAX_HEADER_LENGTH).trim_end().to_string()
}

/// Resolve the `From` header into author and email.
pub fn resolve_sender(raw: Option<&str>) -> Sender {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Sender::default();
    };

    match Address::parse(raw) {
        Some(Address::Mailbox { name, addr }) => Sender {
            author: clean_author(&name),
            email: normalize_mailbox_email(&addr),
        },
        Some(Address::Group { name, members }) => {
            let rendered = members.join(", ");
            debug!(group = %name, email = %rendered, "Group sender, using member addresses");
            Sender {
                author: clean_author(&name),
                email: strip_bare_at(&rendered).to_string(),
            }
        }
        None => {
            debug!(from = raw, "Failed to parse From header");
            Sender {
                author: decode_encoded_words(raw.trim()),
                email: String::new(),
            }
        }
    }
}

/// Unescape `\"`, then peel decoration until nothing changes.
///
/// Each round either decodes leftover encoded words, trims one space from
/// an end, or strips one matching decoration pair. Every strip shortens
/// the string, so the loop ends.
pub fn clean_author(name: &str) -> String {
    let mut author = name.replace("\\\"", "\"");
    let mut decode_passes = 0;

    while !author.is_empty() {
        if decode_passes < MAX_DECODE_PASSES && author.contains("=?") {
            decode_passes += 1;
            let decoded = decode_encoded_words(&author);
            if decoded != author {
                author = decoded;
                continue;
            }
        }
        if author.ends_with(' ') {
            author.pop();
            continue;
        }
        if author.starts_with(' ') {
            author.remove(0);
            continue;
        }
        if author.chars().count() >= 2 && is_decoration_pair(&author) {
            author.pop();
            author.remove(0);
            continue;
        }
        break;
    }
    author
}

fn is_decoration_pair(s: &str) -> bool {
    let (Some(first), Some(last)) = (s.chars().next(), s.chars().last()) else {
        return false;
    };
    DECORATION_OPEN
        .chars()
        .zip(DECORATION_CLOSE.chars())
        .any(|(open, close)| open == first && close == last)
}

/// Strip the gmane relay domain (or a bare trailing `@`) from an address.
fn normalize_mailbox_email(addr: &str) -> String {
    if addr.len() > 21 {
        if let Some(head) = addr.strip_suffix(GMANE_DOMAIN) {
            if head.ends_with('@') {
                return strip_bare_at(head).to_string();
            }
        }
    }
    strip_bare_at(addr).to_string()
}

fn strip_bare_at(addr: &str) -> &str {
    addr.strip_suffix('@').unwrap_or(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_reply_prefixes() {
        assert_eq!(clean_subject("Re: RE:re:  hello"), "hello");
        assert_eq!(clean_subject("   Re:Re: x"), "x");
        assert_eq!(clean_subject("Reply needed"), "Reply needed");
        assert_eq!(clean_subject("re:"), "");
    }

    #[test]
    fn test_subject_decodes_words() {
        assert_eq!(
            clean_subject("Re: =?ISO-8859-1?Q?caf=E9?= talk"),
            "café talk"
        );
        assert_eq!(clean_subject("=?utf-8?q?Re=3A_hi?="), "hi");
    }

    #[test]
    fn test_subject_is_idempotent() {
        for raw in [
            "Re: Re: =?UTF-8?B?SG9sYQ==?=",
            "  re:RE: plain",
            "=?utf-8?q?Re=3A_Re=3A_x?=",
            "no prefix",
        ] {
            let once = clean_subject(raw);
            assert_eq!(clean_subject(&once), once, "{raw}");
        }
    }

    #[test]
    fn test_cap_header() {
        let long = "é".repeat(50);
        let capped = cap_header(&long);
        assert!(capped.len() <= MAX_HEADER_LENGTH);
        assert_eq!(capped.chars().count(), 40);
    }

    #[test]
    fn test_author_decorations() {
        assert_eq!(clean_author("\"(Joey Hess)\""), "Joey Hess");
        assert_eq!(clean_author("  --==Bob==--  "), "Bob");
        assert_eq!(clean_author("[Alice]"), "Alice");
        assert_eq!(clean_author("(unbalanced"), "(unbalanced");
        assert_eq!(clean_author("()"), "");
        assert_eq!(clean_author("x"), "x");
        assert_eq!(clean_author("''"), "");
    }

    #[test]
    fn test_author_unescapes_quotes() {
        assert_eq!(clean_author(r#"Bob \"the builder\""#), "Bob \"the builder\"");
        assert_eq!(clean_author(r#"\"Alice\""#), "Alice");
    }

    #[test]
    fn test_author_decodes_inside_loop() {
        assert_eq!(clean_author("(=?ISO-8859-1?Q?Ren=E9?=)"), "René");
        assert_eq!(clean_author("=?x?Q?broken"), "=?x?Q?broken");
    }

    #[test]
    fn test_author_never_keeps_matching_pair() {
        for raw in ["<<a>>", "**x**", "  (' y ')  ", "..", "|+ z +|"] {
            let out = clean_author(raw);
            assert!(
                out.chars().count() < 2 || !is_decoration_pair(&out),
                "{raw} -> {out}"
            );
        }
    }

    #[test]
    fn test_sender_mailbox() {
        let s = resolve_sender(Some("\"Joey Hess\" <joey@kitenet.net>"));
        assert_eq!(s.author, "Joey Hess");
        assert_eq!(s.email, "joey@kitenet.net");

        let s = resolve_sender(Some("Joey Hess <joey@kitenet.net>, Ann <ann@x.org>"));
        assert_eq!(s.author, "Joey Hess");
        assert_eq!(s.email, "joey@kitenet.net");
    }

    #[test]
    fn test_sender_gmane_relay() {
        let s = resolve_sender(Some("Ann <ann-abcdef@public.gmane.org>"));
        assert_eq!(s.email, "ann-abcdef");
        let s = resolve_sender(Some("x@public.gmane.org"));
        assert_eq!(s.email, "x@public.gmane.org");
        let s = resolve_sender(Some("<someone@>"));
        assert_eq!(s.email, "someone");
    }

    #[test]
    fn test_sender_group() {
        let s = resolve_sender(Some("Team: a@x.org, b@y.org;"));
        assert_eq!(s.author, "Team");
        assert_eq!(s.email, "a@x.org, b@y.org");
    }

    #[test]
    fn test_sender_unparseable() {
        let s = resolve_sender(Some("Broken <oops"));
        assert_eq!(s.author, "Broken <oops");
        assert_eq!(s.email, "");
        assert_eq!(resolve_sender(None), Sender::default());
    }
}
