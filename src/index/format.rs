//! Stored document layout.
//!
//! ```text
//! key term   Q<list><YYYY><MM><NNNNN>        MM = 00 for yearly buckets
//! raw terms  G<list>  A<email>  L<lang>  XSL<stemmer>  XM<list>-<YYYY[MM]>
//! datecode   %Y-%m-%d-%H-%M (UTC)
//! payload    url \n list \n seq \n year \n month \n subject \n author \n email \n body
//! ```

use chrono::{DateTime, Utc};

use super::language::IndexLanguage;
use crate::model::bucket::{Bucket, Period};
use crate::model::document::{Channel, Document};

/// Prefix of the per-document key term.
pub const KEY_PREFIX: &str = "Q";
/// Prefix of the bucket term.
pub const BUCKET_PREFIX: &str = "XM";
pub const LIST_PREFIX: &str = "G";
pub const AUTHOR_PREFIX: &str = "A";
pub const LANG_PREFIX: &str = "L";
pub const STEMMER_PREFIX: &str = "XSL";

/// Width of the sequence suffix of a key.
pub const SEQ_DIGITS: usize = 5;

/// `Q<list><YYYY><MM>`, the part of a key shared by one bucket.
pub fn key_prefix(bucket: &Bucket) -> String {
    format!(
        "{KEY_PREFIX}{}{:04}{:02}",
        bucket.list(),
        bucket.year(),
        bucket.month()
    )
}

/// Unique key of message `seq` in `bucket`.
pub fn document_key(bucket: &Bucket, seq: u32) -> String {
    format!("{}{seq:05}", key_prefix(bucket))
}

/// Sequence number encoded in `term` if it is a key of the bucket with
/// `prefix`.
pub fn key_sequence(term: &str, prefix: &str) -> Option<u32> {
    let suffix = term.strip_prefix(prefix)?;
    if suffix.len() != SEQ_DIGITS || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// `XM<list>-<YYYY[MM]>`.
pub fn bucket_term(bucket: &Bucket) -> String {
    format!("{BUCKET_PREFIX}{}", bucket.key())
}

/// Bucket key carried by a bucket term.
pub fn bucket_key_of(term: &str) -> Option<&str> {
    term.strip_prefix(BUCKET_PREFIX).filter(|k| !k.is_empty())
}

/// Date value stored with every document.
pub fn datecode(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d-%H-%M").to_string()
}

/// Public archive URL of a message.
pub fn display_url(url_base: &str, bucket: &Bucket, seq: u32) -> String {
    match bucket.period() {
        Period::Month(year, month) => {
            format!("{url_base}{}/{year:04}/{month:02}/msg{seq:05}.html", bucket.list())
        }
        Period::Year(year) => format!("{url_base}{}/{year:04}/msg{seq:05}.html", bucket.list()),
    }
}

/// Everything the storage layer needs to write one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub key: String,
    /// Raw terms, key and bucket term included.
    pub terms: Vec<String>,
    pub datecode: String,
    pub body_text: String,
    pub author_text: String,
    pub subject_text: String,
    pub payload: String,
}

/// Lay out `doc` for storage.
pub fn build_record(
    doc: &Document,
    bucket: &Bucket,
    seq: u32,
    language: &IndexLanguage,
    url_base: &str,
) -> DocumentRecord {
    let key = document_key(bucket, seq);

    let mut terms = vec![format!("{LIST_PREFIX}{}", bucket.list())];
    if !doc.email.is_empty() {
        terms.push(format!("{AUTHOR_PREFIX}{}", doc.email));
    }
    terms.push(key.clone());
    if !language.code.is_empty() {
        terms.push(format!("{LANG_PREFIX}{}", language.code));
    }
    if let Some(stemmer) = &language.stemmer_name {
        terms.push(format!("{STEMMER_PREFIX}{stemmer}"));
    }
    terms.push(bucket_term(bucket));

    let payload = format!(
        "{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}",
        display_url(url_base, bucket, seq),
        bucket.list(),
        seq,
        bucket.year(),
        bucket.month(),
        doc.subject,
        doc.author,
        doc.email,
        doc.body,
    );

    DocumentRecord {
        key,
        terms,
        datecode: datecode(doc.date),
        body_text: doc.tokens.text(Channel::Body),
        author_text: doc.tokens.text(Channel::Author),
        subject_text: doc.tokens.text(Channel::Subject),
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::{DateCorrection, TokenStream};
    use chrono::TimeZone;

    fn monthly() -> Bucket {
        Bucket::new("debian-project", Period::Month(2007, 9)).unwrap()
    }

    fn yearly() -> Bucket {
        Bucket::new("debian-cd", Period::Year(1999)).unwrap()
    }

    #[test]
    fn test_keys() {
        assert_eq!(document_key(&monthly(), 42), "Qdebian-project20070900042");
        assert_eq!(document_key(&yearly(), 7), "Qdebian-cd19990000007");
        assert_eq!(key_prefix(&yearly()), "Qdebian-cd199900");
    }

    #[test]
    fn test_key_sequence() {
        let prefix = key_prefix(&monthly());
        assert_eq!(key_sequence("Qdebian-project20070900042", &prefix), Some(42));
        assert_eq!(key_sequence("Qdebian-project200709", &prefix), None);
        assert_eq!(key_sequence("Qdebian-project2007090004x", &prefix), None);
        assert_eq!(key_sequence("Qdebian-project200709000420", &prefix), None);
    }

    #[test]
    fn test_bucket_terms() {
        assert_eq!(bucket_term(&monthly()), "XMdebian-project-200709");
        assert_eq!(bucket_term(&yearly()), "XMdebian-cd-1999");
        assert_eq!(bucket_key_of("XMdebian-cd-1999"), Some("debian-cd-1999"));
        assert_eq!(bucket_key_of("XM"), None);
        assert_eq!(bucket_key_of("Gdebian-cd"), None);
    }

    #[test]
    fn test_urls() {
        let base = "http://lists.debian.org/";
        assert_eq!(
            display_url(base, &monthly(), 3),
            "http://lists.debian.org/debian-project/2007/09/msg00003.html"
        );
        assert_eq!(
            display_url(base, &yearly(), 3),
            "http://lists.debian.org/debian-cd/1999/msg00003.html"
        );
    }

    #[test]
    fn test_record_layout() {
        let mut tokens = TokenStream::new();
        tokens.push(Channel::Subject, "plans");
        tokens.push(Channel::Body, "Hello");
        let doc = Document {
            author: "Joey Hess".into(),
            email: "joey@kitenet.net".into(),
            subject: "plans".into(),
            date: Utc.with_ymd_and_hms(2007, 9, 10, 10, 5, 0).unwrap(),
            date_correction: DateCorrection::Kept,
            body: "Hello World".into(),
            tokens,
        };
        let record = build_record(
            &doc,
            &monthly(),
            1,
            &IndexLanguage::default(),
            "http://lists.debian.org/",
        );
        assert_eq!(record.key, "Qdebian-project20070900001");
        assert_eq!(
            record.terms,
            vec![
                "Gdebian-project",
                "Ajoey@kitenet.net",
                "Qdebian-project20070900001",
                "Len",
                "XSLenglish",
                "XMdebian-project-200709",
            ]
        );
        assert_eq!(record.datecode, "2007-09-10-10-05");
        assert_eq!(
            record.payload,
            "http://lists.debian.org/debian-project/2007/09/msg00001.html\n\
debian-project\n1\n2007\n9\nplans\nJoey Hess\njoey@kitenet.net\nHello World"
        );
        assert_eq!(record.subject_text, "plans");
        assert_eq!(record.author_text, "");
    }
}
