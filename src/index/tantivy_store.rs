//! Segment storage on top of tantivy.
//!
//! Each segment is one tantivy index directory. All raw terms (key, list,
//! author address, language, bucket) share the untokenized `terms` field so
//! that prefix enumeration and delete-by-term work on a single dictionary.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tantivy::collector::{Count, TopDocs};
use tantivy::directory::MmapDirectory;
use tantivy::query::TermQuery;
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer};
use tantivy::{Document, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, warn};

use super::format::DocumentRecord;
use super::language::IndexLanguage;
use super::store::{Segment, Storage};
use crate::error::{IndexError, Result};
use crate::model::document::Channel;

/// Tokenizer name recorded in the schema. The analyzer behind it follows the
/// language of the list being indexed.
pub const ANALYZER: &str = "list_text";

/// Smallest writer budget tantivy accepts for one thread.
const MIN_WRITER_MEMORY: usize = 15_000_000;

/// Tokens longer than this are dropped.
const MAX_TOKEN_LEN: usize = 40;

pub const F_TERMS: &str = "terms";
pub const F_DATECODE: &str = "datecode";
pub const F_BODY: &str = "body";
pub const F_AUTHOR: &str = "author";
pub const F_SUBJECT: &str = "subject";
pub const F_DATA: &str = "data";

/// Schema shared by every segment.
pub fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field(F_TERMS, STRING);
    builder.add_text_field(F_DATECODE, STRING | STORED);

    let text_opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_index_option(IndexRecordOption::WithFreqsAndPositions)
            .set_tokenizer(ANALYZER),
    );
    builder.add_text_field(F_BODY, text_opts.clone());
    builder.add_text_field(F_AUTHOR, text_opts.clone());
    builder.add_text_field(F_SUBJECT, text_opts);

    builder.add_text_field(F_DATA, STORED);
    builder.build()
}

/// Analyzer for `language`: simple word splitting, lowercasing, and stemming
/// when the language has a stemmer.
pub fn build_analyzer(language: &IndexLanguage) -> TextAnalyzer {
    let builder = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
        .filter(LowerCaser);
    match language.stemmer() {
        Some(lang) => builder.filter(Stemmer::new(lang)).build(),
        None => builder.build(),
    }
}

/// Stored values of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub datecode: String,
    pub payload: String,
}

/// Field handles for one opened index.
#[derive(Debug, Clone, Copy)]
struct Fields {
    terms: Field,
    datecode: Field,
    body: Field,
    author: Field,
    subject: Field,
    data: Field,
}

impl Fields {
    fn new(schema: &Schema) -> Result<Self> {
        Ok(Self {
            terms: schema.get_field(F_TERMS)?,
            datecode: schema.get_field(F_DATECODE)?,
            body: schema.get_field(F_BODY)?,
            author: schema.get_field(F_AUTHOR)?,
            subject: schema.get_field(F_SUBJECT)?,
            data: schema.get_field(F_DATA)?,
        })
    }
}

/// Segments under `<prefix>*` on the local filesystem.
#[derive(Debug, Clone)]
pub struct TantivyStorage {
    prefix: PathBuf,
    language: IndexLanguage,
    writer_memory: usize,
}

impl TantivyStorage {
    pub fn new(prefix: impl Into<PathBuf>, language: IndexLanguage, writer_memory: usize) -> Self {
        Self {
            prefix: prefix.into(),
            language,
            writer_memory: writer_memory.max(MIN_WRITER_MEMORY),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }
}

impl Storage for TantivyStorage {
    type Segment = TantivySegment;

    fn segment_paths(&self) -> Result<Vec<PathBuf>> {
        let pattern = format!(
            "{}*",
            glob::Pattern::escape(&self.prefix.to_string_lossy())
        );
        let entries = glob::glob(&pattern)
            .map_err(|e| IndexError::Config(format!("bad storage prefix '{pattern}': {e}")))?;

        let mut paths = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_dir() => paths.push(path),
                Ok(path) => debug!(path = %path.display(), "Not a segment directory, skipping"),
                Err(e) => warn!(error = %e, "Unreadable path under storage prefix"),
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn overflow_path(&self, ordinal: u32) -> PathBuf {
        let mut name = self.prefix.clone().into_os_string();
        name.push(format!("-{ordinal:03}"));
        PathBuf::from(name)
    }

    fn open(&self, path: &Path) -> Result<TantivySegment> {
        TantivySegment::open(path, &self.language, self.writer_memory)
    }
}

/// One open segment with its writer and reader.
pub struct TantivySegment {
    path: PathBuf,
    index: Index,
    language: IndexLanguage,
    writer: IndexWriter,
    reader: IndexReader,
    fields: Fields,
}

impl TantivySegment {
    /// Open (or create) the segment at `path`.
    pub fn open(path: &Path, language: &IndexLanguage, writer_memory: usize) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| IndexError::io(path, e))?;
        let directory = MmapDirectory::open(path).map_err(|e| IndexError::Segment {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let index = Index::open_or_create(directory, build_schema())?;
        index
            .tokenizers()
            .register(ANALYZER, build_analyzer(language));

        let fields = Fields::new(&index.schema())?;
        let writer: IndexWriter =
            index.writer_with_num_threads(1, writer_memory.max(MIN_WRITER_MEMORY))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        debug!(path = %path.display(), language = %language.code, "Opened segment");
        Ok(Self {
            path: path.to_path_buf(),
            index,
            language: language.clone(),
            writer,
            reader,
            fields,
        })
    }

    fn term(&self, text: &str) -> Term {
        Term::from_field_text(self.fields.terms, text)
    }

    /// Number of committed live documents carrying `term`.
    pub fn count_term(&self, text: &str) -> Result<usize> {
        let query = TermQuery::new(self.term(text), IndexRecordOption::Basic);
        Ok(self.reader.searcher().search(&query, &Count)?)
    }

    /// Stored values of the committed document with `key`.
    pub fn stored(&self, key: &str) -> Result<Option<StoredDocument>> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(self.term(key), IndexRecordOption::Basic);
        let Some((_, address)) = searcher
            .search(&query, &TopDocs::with_limit(1))?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };
        let doc: TantivyDocument = searcher.doc(address)?;
        let json: serde_json::Value = serde_json::from_str(&doc.to_json(&searcher.schema()))
            .map_err(|e| IndexError::Segment {
                path: self.path.clone(),
                reason: format!("unreadable stored document '{key}': {e}"),
            })?;
        let first = |field: &str| {
            json.get(field)
                .and_then(|v| v.get(0))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        Ok(Some(StoredDocument {
            datecode: first(F_DATECODE),
            payload: first(F_DATA),
        }))
    }
}

impl Segment for TantivySegment {
    fn path(&self) -> &Path {
        &self.path
    }

    fn doc_count(&self) -> Result<u64> {
        Ok(self.reader.searcher().num_docs())
    }

    fn language(&self) -> &IndexLanguage {
        &self.language
    }

    // The writer builds its per-field analyzers when it starts a new
    // in-memory segment, which happens after every commit.
    fn set_language(&mut self, language: &IndexLanguage) -> Result<()> {
        if &self.language == language {
            return Ok(());
        }
        self.index
            .tokenizers()
            .register(ANALYZER, build_analyzer(language));
        debug!(
            path = %self.path.display(),
            from = %self.language.code,
            to = %language.code,
            "Switched segment analyzer"
        );
        self.language = language.clone();
        Ok(())
    }

    fn terms_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let searcher = self.reader.searcher();
        let mut candidates = BTreeSet::new();

        for segment_reader in searcher.segment_readers() {
            let inverted = segment_reader.inverted_index(self.fields.terms)?;
            let mut stream = inverted
                .terms()
                .range()
                .ge(prefix.as_bytes())
                .into_stream()?;
            while stream.advance() {
                let key = stream.key();
                if !key.starts_with(prefix.as_bytes()) {
                    break;
                }
                if let Ok(term) = std::str::from_utf8(key) {
                    candidates.insert(term.to_string());
                }
            }
        }

        // Deleted documents keep their terms in the dictionary until merged.
        let mut live = Vec::with_capacity(candidates.len());
        for term in candidates {
            if self.count_term(&term)? > 0 {
                live.push(term);
            }
        }
        Ok(live)
    }

    fn replace(&mut self, record: DocumentRecord) -> Result<()> {
        let mut doc = TantivyDocument::default();
        for term in &record.terms {
            doc.add_text(self.fields.terms, term);
        }
        doc.add_text(self.fields.datecode, &record.datecode);
        doc.add_text(self.fields.body, &record.body_text);
        doc.add_text(self.fields.author, &record.author_text);
        for _ in 0..Channel::Subject.weight() {
            doc.add_text(self.fields.subject, &record.subject_text);
        }
        doc.add_text(self.fields.data, &record.payload);

        self.writer.delete_term(self.term(&record.key));
        self.writer.add_document(doc)?;
        Ok(())
    }

    fn delete_term(&mut self, term: &str) -> Result<()> {
        self.writer.delete_term(self.term(term));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.commit()?;
        self.reader.reload()?;
        debug!(path = %self.path.display(), "Segment flushed");
        Ok(())
    }
}
