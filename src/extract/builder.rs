//! Assembles one [`Document`] from a parsed message.

use crate::model::bucket::Bucket;
use crate::model::document::{Channel, Document};
use crate::model::message::ParsedMessage;
use crate::parser::header::parse_date;

use super::date::correct_date;
use super::headers::{cap_header, clean_subject, resolve_sender};
use super::text::TextNormalizer;
use super::walker::ContentWalker;

/// Builds documents. Holds only configuration; every call starts from
/// fresh accumulators.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    default_charset: String,
}

impl DocumentBuilder {
    /// `default_charset` applies to parts that do not declare one.
    pub fn new(default_charset: impl Into<String>) -> Self {
        Self {
            default_charset: default_charset.into(),
        }
    }

    /// Build the document for `message`, filed under `key` in `bucket`.
    ///
    /// Returns `None` only when there is no message. Malformed headers or
    /// bodies degrade to empty fields.
    pub fn build(
        &self,
        message: Option<&ParsedMessage>,
        bucket: &Bucket,
        key: &str,
    ) -> Option<Document> {
        let message = message?;
        let mut normalizer = TextNormalizer::new();

        let sender = resolve_sender(message.header("from"));
        normalizer.push_header(Channel::Author, &sender.author);

        let subject = clean_subject(message.header("subject").unwrap_or_default());
        normalizer.push_header(Channel::Subject, &subject);

        let parsed_date = message.header("date").and_then(parse_date);
        let (date, date_correction) = correct_date(parsed_date, bucket, key);

        ContentWalker::new(&self.default_charset, &mut normalizer).walk(&message.root);

        let (body, tokens) = normalizer.finish();
        Some(Document {
            author: cap_header(&sender.author),
            email: sender.email,
            subject: cap_header(&subject),
            date,
            date_correction,
            body,
            tokens,
        })
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new("iso-8859-1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::date::DateCorrection;
    use crate::model::bucket::Period;
    use crate::model::document::{MAX_HEADER_LENGTH, SNIPPET_CAPACITY};
    use crate::parser::mime::parse_message;
    use chrono::TimeZone;
    use chrono::Utc;

    fn bucket() -> Bucket {
        Bucket::new("debian-project", Period::Month(2007, 9)).unwrap()
    }

    #[test]
    fn test_no_message_no_document() {
        assert!(DocumentBuilder::default()
            .build(None, &bucket(), "k")
            .is_none());
    }

    #[test]
    fn test_full_document() {
        let raw = b"From joey Mon Sep 10 10:00:00 2007\n\
Message-Id: <1@kitenet.net>\n\
From: \"Joey Hess\" <joey@kitenet.net>\n\
Subject: Re: Re: =?ISO-8859-1?Q?caf=E9?= plans\n\
Date: Mon, 10 Sep 2007 12:00:00 +0200\n\
\n\
Hello\n> quoted\nWorld\n";
        let msg = parse_message(raw).unwrap();
        let doc = DocumentBuilder::default()
            .build(Some(&msg), &bucket(), "Qdebian-project20070900000")
            .unwrap();

        assert_eq!(doc.author, "Joey Hess");
        assert_eq!(doc.email, "joey@kitenet.net");
        assert_eq!(doc.subject, "café plans");
        assert_eq!(doc.body, "Hello World");
        assert_eq!(doc.date, Utc.with_ymd_and_hms(2007, 9, 10, 10, 0, 0).unwrap());
        assert_eq!(doc.tokens.text(Channel::Author), "Joey Hess");
        assert_eq!(doc.tokens.text(Channel::Subject), "café plans");
        assert!(doc.tokens.text(Channel::Body).contains("quoted"));
    }

    #[test]
    fn test_headers_are_capped_after_indexing() {
        let long = "word ".repeat(40);
        let raw = format!("Subject: {long}\nFrom: {long} <a@b.org>\n\nbody\n");
        let msg = parse_message(raw.as_bytes()).unwrap();
        let doc = DocumentBuilder::default()
            .build(Some(&msg), &bucket(), "k")
            .unwrap();
        assert!(doc.subject.len() <= MAX_HEADER_LENGTH);
        assert!(doc.author.len() <= MAX_HEADER_LENGTH);
        assert!(doc.tokens.text(Channel::Subject).len() > MAX_HEADER_LENGTH);
        assert!(doc.body.len() <= SNIPPET_CAPACITY);
    }

    #[test]
    fn test_missing_headers_degrade() {
        let msg = parse_message(b"X-Nothing: here\n\n\n").unwrap();
        let doc = DocumentBuilder::default()
            .build(Some(&msg), &bucket(), "k")
            .unwrap();
        assert_eq!(doc.author, "");
        assert_eq!(doc.email, "");
        assert_eq!(doc.subject, "");
        assert_eq!(doc.body, "");
        assert_eq!(doc.date, bucket().start());
        assert_eq!(doc.date_correction, DateCorrection::Missing);
    }

    #[test]
    fn test_far_date_is_reported() {
        let raw = b"Subject: s\nDate: Sat, 10 Nov 2007 10:00:00 +0000\n\nbody\n";
        let msg = parse_message(raw).unwrap();
        let doc = DocumentBuilder::default()
            .build(Some(&msg), &bucket(), "k")
            .unwrap();
        assert_eq!(doc.date_correction, DateCorrection::TooLate);
        assert_eq!(doc.date, Utc.with_ymd_and_hms(2007, 9, 30, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_undeclared_charset_uses_default() {
        let msg = parse_message(b"Message-Id: <1@x>\nSubject: s\n\ncaf\xe9 cr\xe8me\n").unwrap();
        let doc = DocumentBuilder::default()
            .build(Some(&msg), &bucket(), "k")
            .unwrap();
        assert_eq!(doc.body, "café crème");
        assert_eq!(doc.tokens.text(Channel::Body).trim_end(), "café crème");
    }

    #[test]
    fn test_html_inline_markup() {
        let raw = b"Subject: s\nContent-Type: text/html; charset=utf-8\n\n\
<p>Hel<b>lo</b> wor<i>ld</i></p>\n";
        let msg = parse_message(raw).unwrap();
        let doc = DocumentBuilder::default()
            .build(Some(&msg), &bucket(), "k")
            .unwrap();
        assert_eq!(doc.body, "Hello world");
    }

    #[test]
    fn test_fresh_document_per_call() {
        let builder = DocumentBuilder::default();
        let a = parse_message(b"Subject: a\n\nfirst body\n").unwrap();
        let b = parse_message(b"Subject: b\n\nsecond body\n").unwrap();
        let doc_a = builder.build(Some(&a), &bucket(), "k").unwrap();
        let doc_b = builder.build(Some(&b), &bucket(), "k").unwrap();
        assert_eq!(doc_a.body, "first body");
        assert_eq!(doc_b.body, "second body");
    }
}
