//! Sender address parsing (RFC 5322 §3.4).
//!
//! Only the shapes found in list archives are handled: a single mailbox in
//! angle, bare or comment form, and a named group of mailboxes.

/// A parsed `From`-style address.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `Mailbox { name: "Juan García", addr: "juan@ejemplo.com" }`
/// - `"juan@ejemplo.com (Juan)"` → `Mailbox { name: "Juan", addr: "juan@ejemplo.com" }`
/// - `"devs: a@x.org, b@y.org;"` → `Group { name: "devs", members: [..] }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// One mailbox. `name` keeps `\"` escapes as written.
    Mailbox { name: String, addr: String },
    /// A group of mailboxes.
    Group { name: String, members: Vec<String> },
}

impl Address {
    /// Parse a sender header value. A list of mailboxes yields its first.
    ///
    /// Returns `None` when the value is empty or its angle brackets do not
    /// balance.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some((name, rest)) = split_group(trimmed) {
            let members = split_list(rest.trim_end().trim_end_matches(';'))
                .iter()
                .filter_map(|m| match Self::parse_mailbox(m)? {
                    Self::Mailbox { addr, .. } if !addr.is_empty() => Some(addr),
                    _ => None,
                })
                .collect();
            return Some(Self::Group {
                name: strip_quotes(name),
                members,
            });
        }

        let first = split_list(trimmed).into_iter().next()?;
        Self::parse_mailbox(&first)
    }

    fn parse_mailbox(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        // "Display Name <address>" or "<address>"
        match (trimmed.rfind('<'), trimmed.rfind('>')) {
            (Some(open), Some(close)) if close > open => {
                let addr = trimmed[open + 1..close].trim().to_string();
                let name = strip_quotes(&trimmed[..open]);
                return Some(Self::Mailbox { name, addr });
            }
            (None, None) => {}
            _ => return None,
        }

        // "address (Display Name)"
        if let Some(open) = trimmed.find('(') {
            if trimmed.ends_with(')') && open > 0 {
                let addr = trimmed[..open].trim().to_string();
                let name = trimmed[open + 1..trimmed.len() - 1].trim().to_string();
                return Some(Self::Mailbox { name, addr });
            }
        }

        Some(Self::Mailbox {
            name: String::new(),
            addr: trimmed.to_string(),
        })
    }
}

/// Split `name: members;` at the group colon, ignoring colons inside quotes
/// or angle brackets.
fn split_group(s: &str) -> Option<(&str, &str)> {
    let mut in_quotes = false;
    let mut prev = '\0';
    for (i, ch) in s.char_indices() {
        match ch {
            '"' if prev != '\\' => in_quotes = !in_quotes,
            '<' | '@' if !in_quotes => return None,
            ':' if !in_quotes => return Some((&s[..i], &s[i + 1..])),
            _ => {}
        }
        prev = ch;
    }
    None
}

/// Split a comma-separated mailbox list, honoring quotes, angle brackets
/// and comments.
fn split_list(raw: &str) -> Vec<String> {
    let mut results = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut comment_depth = 0usize;

    for ch in raw.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '<' if !in_quotes => {
                in_angle = true;
                current.push(ch);
            }
            '>' if !in_quotes => {
                in_angle = false;
                current.push(ch);
            }
            '(' if !in_quotes => {
                comment_depth += 1;
                current.push(ch);
            }
            ')' if !in_quotes => {
                comment_depth = comment_depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if !in_quotes && !in_angle && comment_depth == 0 => {
                results.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    results.push(current);
    results.retain(|s| !s.trim().is_empty());
    results
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailbox(name: &str, addr: &str) -> Address {
        Address::Mailbox {
            name: name.to_string(),
            addr: addr.to_string(),
        }
    }

    #[test]
    fn test_parse_bare_address() {
        assert_eq!(
            Address::parse("user@example.com"),
            Some(mailbox("", "user@example.com"))
        );
        assert_eq!(
            Address::parse("<user@example.com>"),
            Some(mailbox("", "user@example.com"))
        );
    }

    #[test]
    fn test_parse_name_and_address() {
        assert_eq!(
            Address::parse("User One <user1@example.com>"),
            Some(mailbox("User One", "user1@example.com"))
        );
        assert_eq!(
            Address::parse("\"Last, First\" <user@example.com>"),
            Some(mailbox("Last, First", "user@example.com"))
        );
    }

    #[test]
    fn test_parse_comment_name() {
        assert_eq!(
            Address::parse("joey@kitenet.net (Joey Hess)"),
            Some(mailbox("Joey Hess", "joey@kitenet.net"))
        );
    }

    #[test]
    fn test_escaped_quotes_are_kept() {
        assert_eq!(
            Address::parse(r#""Bob \"the builder\"" <bob@example.com>"#),
            Some(mailbox(r#"Bob \"the builder\""#, "bob@example.com"))
        );
    }

    #[test]
    fn test_parse_group() {
        assert_eq!(
            Address::parse("Debian Devs: a@debian.org, B <b@debian.org>;"),
            Some(Address::Group {
                name: "Debian Devs".to_string(),
                members: vec!["a@debian.org".to_string(), "b@debian.org".to_string()],
            })
        );
    }

    #[test]
    fn test_mailbox_list_uses_first() {
        assert_eq!(Address::parse("a@x, b@y"), Some(mailbox("", "a@x")));
        assert_eq!(
            Address::parse("\"Doe, Jane\" <jane@x.org>, John <john@x.org>"),
            Some(mailbox("Doe, Jane", "jane@x.org"))
        );
        assert_eq!(
            Address::parse("jane@x.org (Doe, Jane), john@x.org"),
            Some(mailbox("Doe, Jane", "jane@x.org"))
        );
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(Address::parse(""), None);
        assert_eq!(Address::parse("   "), None);
        assert_eq!(Address::parse("Broken <user@example.com"), None);
    }
}
