//! `<archive>.spam` sidecar lists.

use std::collections::HashSet;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::parser::header::normalize_message_id;

const SPAM_DIRECTIVE: &str = "skip-spam-message-id:";

/// Path of the sidecar list belonging to `archive`.
pub fn spam_list_path(archive: &Path) -> PathBuf {
    let mut name = OsString::from(archive.as_os_str());
    name.push(".spam");
    PathBuf::from(name)
}

/// Message identities that must not be indexed.
#[derive(Debug, Clone, Default)]
pub struct SpamList {
    ids: HashSet<String>,
}

impl SpamList {
    /// Load the sidecar of `archive`. A missing or unreadable file yields an
    /// empty list.
    pub fn load(archive: &Path) -> Self {
        let path = spam_list_path(archive);
        let contents = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read spam list");
                return Self::default();
            }
        };
        let list = Self::parse(&String::from_utf8_lossy(&contents));
        debug!(path = %path.display(), entries = list.len(), "Loaded spam list");
        list
    }

    /// Parse sidecar text. Lines other than `skip-spam-message-id:` lines
    /// are ignored.
    pub fn parse(text: &str) -> Self {
        let ids = text
            .lines()
            .filter_map(|line| {
                let head = line.get(..SPAM_DIRECTIVE.len())?;
                if !head.eq_ignore_ascii_case(SPAM_DIRECTIVE) {
                    return None;
                }
                let id = normalize_message_id(&line[SPAM_DIRECTIVE.len()..]);
                (!id.is_empty()).then_some(id)
            })
            .collect();
        Self { ids }
    }

    /// `identity` must already be normalized.
    pub fn contains(&self, identity: &str) -> bool {
        self.ids.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
