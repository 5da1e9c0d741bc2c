//! Drives archive files through parsing, extraction and storage.
//!
//! Per file: derive the bucket, activate its segment, find the resume point
//! (or purge the bucket when forced), load the spam list, stream messages,
//! and flush once enough documents are pending.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::catalog::SegmentCatalog;
use super::format::{build_record, bucket_term, document_key, key_prefix, key_sequence};
use super::language::IndexLanguage;
use super::spam::SpamList;
use super::store::{Segment, Storage};
use crate::config::Config;
use crate::error::{IndexError, Result, Severity};
use crate::extract::DocumentBuilder;
use crate::model::bucket::Bucket;
use crate::parser::header::message_identity;
use crate::parser::mbox::MboxReader;
use crate::parser::MessageSource;

/// Documents between two throughput log lines.
const THROUGHPUT_INTERVAL: u64 = 10_000;

/// Per-run indexing policy.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Rebuild buckets from scratch instead of resuming.
    pub force: bool,
    /// Pending documents above which a file boundary flushes.
    pub flush_interval: u64,
    /// Overflow segments holding more documents than this are not reused.
    pub chunk_size: u64,
    pub url_base: String,
    /// Language of lists without an entry in `languages`.
    pub language: IndexLanguage,
    pub languages: HashMap<String, IndexLanguage>,
    pub default_charset: String,
}

impl IndexOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            force: config.indexing.force,
            flush_interval: config.indexing.flush_interval,
            chunk_size: config.storage.chunk_size,
            url_base: config.indexing.url_base.clone(),
            language: IndexLanguage::resolve(&config.indexing.language),
            languages: config
                .indexing
                .languages
                .iter()
                .map(|(list, lang)| (list.clone(), IndexLanguage::resolve(lang)))
                .collect(),
            default_charset: config.indexing.default_charset.clone(),
        }
    }

    /// Indexing language of `list`.
    pub fn language_for(&self, list: &str) -> &IndexLanguage {
        self.languages.get(list).unwrap_or(&self.language)
    }
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Counters of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Files read to the end.
    pub files: u64,
    /// Files abandoned on a file-level error.
    pub failed_files: u64,
    /// Messages that were given a sequence number.
    pub messages: u64,
    /// Documents submitted to storage.
    pub documents: u64,
    pub duplicates: u64,
    pub spam: u64,
    /// Messages at or below the resume point.
    pub resumed_skips: u64,
    pub missing_ids: u64,
    pub parse_failures: u64,
    /// Documents whose date was missing or clamped into their bucket.
    pub corrected_dates: u64,
    pub bytes_read: u64,
}

/// Logs documents per second every [`THROUGHPUT_INTERVAL`] documents.
#[derive(Debug)]
struct Throughput {
    started: Instant,
    logged: u64,
}

impl Throughput {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            logged: 0,
        }
    }

    fn record(&mut self, documents: u64) {
        if documents < self.logged + THROUGHPUT_INTERVAL {
            return;
        }
        self.logged = documents;
        let secs = self.started.elapsed().as_secs_f64();
        let rate = if secs > 0.0 { documents as f64 / secs } else { 0.0 };
        info!(documents, elapsed_secs = secs, rate = rate as u64, "Indexing throughput");
    }
}

/// Sequential indexer over any [`Storage`].
pub struct IndexController<S: Storage> {
    catalog: SegmentCatalog<S>,
    options: IndexOptions,
    builder: DocumentBuilder,
    /// Documents submitted to the active segment since its last flush.
    pending: u64,
    /// Deletes or documents not yet flushed.
    unflushed: bool,
    /// Highest sequence submitted per bucket in this run.
    written: HashMap<String, u32>,
    /// Buckets already purged in this run.
    purged: HashSet<String>,
    summary: RunSummary,
    throughput: Throughput,
}

impl<S: Storage> IndexController<S> {
    /// Scan the existing segments of `storage` and get ready to index.
    pub fn new(storage: S, options: IndexOptions) -> Result<Self> {
        let catalog = SegmentCatalog::load(storage, options.chunk_size)?;
        let builder = DocumentBuilder::new(options.default_charset.clone());
        Ok(Self {
            catalog,
            options,
            builder,
            pending: 0,
            unflushed: false,
            written: HashMap::new(),
            purged: HashSet::new(),
            summary: RunSummary::default(),
            throughput: Throughput::new(),
        })
    }

    /// Index MBOX archive files in order.
    ///
    /// `progress` receives `(file, bytes_read, total_bytes)`.
    pub fn run(
        &mut self,
        files: &[PathBuf],
        progress: Option<&dyn Fn(&Path, u64, u64)>,
    ) -> Result<RunSummary> {
        self.run_with(files, |path: &Path| MboxReader::open(path), progress)
    }

    /// Index files using `open` to turn each path into a message stream.
    pub fn run_with<M, F>(
        &mut self,
        files: &[PathBuf],
        mut open: F,
        progress: Option<&dyn Fn(&Path, u64, u64)>,
    ) -> Result<RunSummary>
    where
        M: MessageSource,
        F: FnMut(&Path) -> Result<M>,
    {
        for path in files {
            match self.index_file(path, &mut open, progress) {
                Ok(()) => self.summary.files += 1,
                Err(e) if e.severity() == Severity::File => {
                    error!(path = %path.display(), error = %e, "Abandoning archive file");
                    self.summary.failed_files += 1;
                }
                Err(e) => return Err(e),
            }
            if self.pending > self.options.flush_interval {
                debug!(pending = self.pending, "Flush interval reached");
                self.flush()?;
            }
        }
        if self.unflushed {
            self.flush()?;
        }
        info!(
            files = self.summary.files,
            failed = self.summary.failed_files,
            documents = self.summary.documents,
            "Indexing finished"
        );
        Ok(self.summary.clone())
    }

    /// Counters so far.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn flush(&mut self) -> Result<()> {
        self.catalog.flush()?;
        self.pending = 0;
        self.unflushed = false;
        Ok(())
    }

    fn index_file<M, F>(
        &mut self,
        path: &Path,
        open: &mut F,
        progress: Option<&dyn Fn(&Path, u64, u64)>,
    ) -> Result<()>
    where
        M: MessageSource,
        F: FnMut(&Path) -> Result<M>,
    {
        let bucket = Bucket::from_archive_path(path)?;
        let mut source = open(path)?;
        info!(path = %path.display(), bucket = %bucket, "Indexing archive");

        if self.catalog.activate_for(&bucket)? {
            self.pending = 0;
            self.unflushed = false;
        }
        let language = self.options.language_for(bucket.list()).clone();
        if self.catalog.active_mut()?.language() != &language {
            if self.unflushed {
                self.flush()?;
            }
            info!(list = bucket.list(), language = %language.code, "Switching language");
            self.catalog.active_mut()?.set_language(&language)?;
        }

        let resume_point = self.prepare_bucket(&bucket)?;
        let spam = SpamList::load(path);

        let mut seen: HashSet<String> = HashSet::new();
        let mut seq: u32 = 0;
        let mut failed_at: Option<u64> = None;
        let total = source.total_bytes().unwrap_or(0);
        let read_before = self.summary.bytes_read;

        while let Some(item) = source.next_item()? {
            self.summary.bytes_read = read_before + source.bytes_read();
            if let Some(report) = progress {
                report(path, source.bytes_read(), total);
            }

            let Some(message) = item.message else {
                if failed_at == Some(item.offset) {
                    return Err(IndexError::ParserStuck {
                        path: path.to_path_buf(),
                        offset: item.offset,
                    });
                }
                warn!(offset = item.offset, "Skipping unparseable message");
                failed_at = Some(item.offset);
                self.summary.parse_failures += 1;
                continue;
            };
            failed_at = None;

            let identity = message_identity(&message);
            if identity.is_empty() {
                info!(offset = item.offset, "Message-Id is empty, skipping");
                self.summary.missing_ids += 1;
                continue;
            }
            if seen.contains(&identity) {
                info!(id = %identity, offset = item.offset, "Duplicate Message-Id, skipping");
                self.summary.duplicates += 1;
                continue;
            }
            seen.insert(identity.clone());
            self.summary.messages += 1;

            let key = document_key(&bucket, seq);
            if spam.contains(&identity) {
                info!(id = %identity, key = %key, "Spam listed, deleting slot");
                self.catalog.active_mut()?.delete_term(&key)?;
                self.unflushed = true;
                self.summary.spam += 1;
            } else if self.options.force || resume_point.map_or(true, |r| seq > r) {
                if let Some(doc) = self.builder.build(Some(&message), &bucket, &key) {
                    if doc.date_correction.is_corrected() {
                        self.summary.corrected_dates += 1;
                    }
                    let record = build_record(
                        &doc,
                        &bucket,
                        seq,
                        &language,
                        &self.options.url_base,
                    );
                    self.catalog.active_mut()?.replace(record)?;
                    self.written
                        .entry(bucket.key())
                        .and_modify(|s| *s = (*s).max(seq))
                        .or_insert(seq);
                    self.pending += 1;
                    self.unflushed = true;
                    self.summary.documents += 1;
                    self.throughput.record(self.summary.documents);
                }
            } else {
                self.summary.resumed_skips += 1;
            }
            seq += 1;
        }
        self.summary.bytes_read = read_before + source.bytes_read();
        debug!(path = %path.display(), messages = seq, "Archive done");
        Ok(())
    }

    /// Purge the bucket when forced, otherwise find its resume point.
    fn prepare_bucket(&mut self, bucket: &Bucket) -> Result<Option<u32>> {
        if self.options.force {
            if self.purged.insert(bucket.key()) {
                info!(bucket = %bucket, "Purging bucket before regenerating");
                self.catalog
                    .active_mut()?
                    .delete_term(&bucket_term(bucket))?;
                self.unflushed = true;
            }
            return Ok(None);
        }

        let prefix = key_prefix(bucket);
        let stored = self
            .catalog
            .active_mut()?
            .terms_with_prefix(&prefix)?
            .iter()
            .filter_map(|term| key_sequence(term, &prefix))
            .max();
        let resume = stored.max(self.written.get(&bucket.key()).copied());
        if let Some(point) = resume {
            info!(bucket = %bucket, resume_point = point, "Resuming bucket");
        }
        Ok(resume)
    }
}
