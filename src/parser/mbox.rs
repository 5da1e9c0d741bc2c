//! Streaming MBOX reader.
//!
//! Reads archive files line by line through a 1 MB buffer and hands out one
//! message at a time. Never loads the entire file into memory. Tolerant of
//! malformed input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::mime::parse_message;
use super::{MessageSource, SourceItem};
use crate::error::{IndexError, Result};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Raw messages larger than this are truncated before MIME parsing.
const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Streaming MBOX reader.
///
/// Splits the file at `From ` separator lines. The reader is tolerant of:
///
/// - Mixed `\n` and `\r\n` line endings
/// - `From ` lines not preceded by a blank line (logs a warning)
/// - Truncated messages at EOF
/// - NUL bytes and other binary content in the body
/// - UTF-8 BOM at the start of the file
pub struct MboxReader {
    path: PathBuf,
    file_size: u64,
    reader: BufReader<File>,
    /// Offset of the first byte not yet consumed from `reader`.
    offset: u64,
    /// Separator line that opens the next message, already consumed.
    pending: Option<(u64, Vec<u8>)>,
    prev_line_was_empty: bool,
    line_buf: Vec<u8>,
}

impl MboxReader {
    /// Open an archive file.
    ///
    /// Verifies that the file exists and is readable, but does NOT validate
    /// that it is actually an MBOX.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IndexError::FileNotFound(path.clone())
            } else {
                IndexError::io(&path, e)
            }
        })?;
        let file_size = file
            .metadata()
            .map_err(|e| IndexError::io(&path, e))?
            .len();
        Ok(Self {
            path,
            file_size,
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            offset: 0,
            pending: None,
            prev_line_was_empty: true,
            line_buf: Vec::with_capacity(4096),
        })
    }

    /// Total size of the underlying file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Path to the MBOX file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the next line into `line_buf`. Returns `false` at EOF.
    fn read_line(&mut self) -> Result<bool> {
        self.line_buf.clear();
        let buf = self
            .reader
            .fill_buf()
            .map_err(|e| IndexError::io(&self.path, e))?;
        if buf.is_empty() {
            return Ok(false);
        }
        let consume_len = match memchr_newline(buf) {
            Some(pos) => pos + 1,
            None => buf.len(),
        };
        self.line_buf.extend_from_slice(&buf[..consume_len]);
        self.reader.consume(consume_len);
        Ok(true)
    }

    /// Next raw message as `(offset, bytes)`, separator line included.
    pub fn next_raw(&mut self) -> Result<Option<(u64, Vec<u8>)>> {
        let (start, mut message_buf) = match self.pending.take() {
            Some(pending) => pending,
            None => (self.offset, Vec::new()),
        };
        let mut truncated = false;

        loop {
            let line_start = self.offset;
            // A message ending without a newline leaves the last chunk here.
            if !self.read_line()? {
                break;
            }
            self.offset += self.line_buf.len() as u64;

            let is_from_line = is_mbox_separator(&self.line_buf);
            if is_from_line && !message_buf.is_empty() {
                if !self.prev_line_was_empty {
                    warn!(
                        offset = line_start,
                        "Found 'From ' separator without preceding blank line"
                    );
                }
                self.pending = Some((line_start, self.line_buf.clone()));
                self.prev_line_was_empty = false;
                return Ok(Some((start, message_buf)));
            }

            if message_buf.len() + self.line_buf.len() <= MAX_MESSAGE_SIZE {
                message_buf.extend_from_slice(&self.line_buf);
            } else if !truncated {
                truncated = true;
                warn!(
                    offset = start,
                    max_size = MAX_MESSAGE_SIZE,
                    "Message exceeds maximum size, truncating body"
                );
            }
            self.prev_line_was_empty = is_blank_line(&self.line_buf);
        }

        if message_buf.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }
        Ok(Some((start, message_buf)))
    }
}

impl MessageSource for MboxReader {
    fn next_item(&mut self) -> Result<Option<SourceItem>> {
        let Some((offset, raw)) = self.next_raw()? else {
            return Ok(None);
        };
        let message = parse_message(&raw);
        if message.is_none() {
            debug!(offset, len = raw.len(), "MIME parser rejected message");
        }
        Ok(Some(SourceItem { offset, message }))
    }

    fn bytes_read(&self) -> u64 {
        self.offset
    }

    fn total_bytes(&self) -> Option<u64> {
        Some(self.file_size)
    }
}

/// Fast newline search (equivalent to memchr for `\n`).
#[inline]
fn memchr_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_mbox(content: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_is_mbox_separator() {
        assert!(is_mbox_separator(
            b"From user@example.com Thu Jan 01 00:00:00 2024\n"
        ));
        assert!(!is_mbox_separator(b"from user@example.com\n"));
        assert!(!is_mbox_separator(b">From user@example.com\n"));
        assert!(!is_mbox_separator(b"Subject: From here\n"));
    }

    #[test]
    fn test_is_mbox_separator_with_bom() {
        let mut line = vec![0xEF, 0xBB, 0xBF];
        line.extend_from_slice(b"From user@example.com Thu Jan 01 00:00:00 2024\n");
        assert!(is_mbox_separator(&line));
    }

    #[test]
    fn test_is_blank_line() {
        assert!(is_blank_line(b"\n"));
        assert!(is_blank_line(b"\r\n"));
        assert!(!is_blank_line(b"hello\n"));
    }

    #[test]
    fn test_splits_messages_with_offsets() {
        let data = b"From a@x Mon Jan 1 00:00:00 2007\nSubject: one\n\nbody one\n\n\
From b@x Mon Jan 1 00:00:00 2007\nSubject: two\n\nbody two";
        let f = write_mbox(data);
        let mut reader = MboxReader::open(f.path()).unwrap();

        let (off1, first) = reader.next_raw().unwrap().unwrap();
        assert_eq!(off1, 0);
        assert!(first.ends_with(b"body one\n\n"));

        let (off2, second) = reader.next_raw().unwrap().unwrap();
        assert_eq!(off2 as usize, first.len());
        assert!(second.starts_with(b"From b@x"));
        assert!(second.ends_with(b"body two"));

        assert!(reader.next_raw().unwrap().is_none());
        assert_eq!(reader.bytes_read(), data.len() as u64);
    }

    #[test]
    fn test_empty_file_has_no_messages() {
        let f = write_mbox(b"");
        let mut reader = MboxReader::open(f.path()).unwrap();
        assert!(reader.next_item().unwrap().is_none());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            MboxReader::open("/nonexistent/debian-devel-200701"),
            Err(IndexError::FileNotFound(_))
        ));
    }
}
