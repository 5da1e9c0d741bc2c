//! Bucket-to-segment mapping and the active segment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::format::{bucket_key_of, BUCKET_PREFIX};
use super::store::{Segment, Storage};
use crate::error::{IndexError, Result};
use crate::model::bucket::Bucket;

/// Knows which segment holds which bucket and keeps one segment open.
pub struct SegmentCatalog<S: Storage> {
    storage: S,
    chunk_size: u64,
    buckets: HashMap<String, PathBuf>,
    overflow_ordinal: u32,
    active: Option<S::Segment>,
}

impl<S: Storage> SegmentCatalog<S> {
    /// Scan every existing segment for its bucket terms.
    pub fn load(storage: S, chunk_size: u64) -> Result<Self> {
        let mut buckets = HashMap::new();
        for path in storage.segment_paths()? {
            let segment = storage.open(&path)?;
            let terms = segment.terms_with_prefix(BUCKET_PREFIX)?;
            debug!(path = %path.display(), buckets = terms.len(), "Scanned segment");
            for term in terms {
                if let Some(key) = bucket_key_of(&term) {
                    buckets.insert(key.to_string(), path.clone());
                }
            }
        }
        info!(buckets = buckets.len(), "Loaded segment map");
        Ok(Self {
            storage,
            chunk_size,
            buckets,
            overflow_ordinal: 0,
            active: None,
        })
    }

    /// Make the segment for `bucket` the active one.
    ///
    /// Unknown buckets go to the first overflow segment holding at most
    /// `chunk_size` documents, and are remembered there. Returns whether a
    /// different segment was active before; it has been flushed.
    pub fn activate_for(&mut self, bucket: &Bucket) -> Result<bool> {
        let key = bucket.key();
        if let Some(path) = self.buckets.get(&key).cloned() {
            return self.activate(&path);
        }

        let mut switched = false;
        loop {
            let path = self.storage.overflow_path(self.overflow_ordinal);
            switched |= self.activate(&path)?;
            let count = self.active_mut()?.doc_count()?;
            if count <= self.chunk_size {
                debug!(bucket = %key, path = %path.display(), count, "Using overflow segment");
                self.buckets.insert(key, path);
                break;
            }
            info!(path = %path.display(), count, "Overflow segment full, moving on");
            self.overflow_ordinal += 1;
        }
        Ok(switched)
    }

    /// Open `path` unless it is already active. Returns whether the active
    /// segment changed.
    fn activate(&mut self, path: &Path) -> Result<bool> {
        if self.active.as_ref().is_some_and(|s| s.path() == path) {
            return Ok(false);
        }
        if let Some(mut previous) = self.active.take() {
            previous.flush()?;
            debug!(path = %previous.path().display(), "Closed segment");
        }
        self.active = Some(self.storage.open(path)?);
        Ok(true)
    }

    /// The active segment.
    pub fn active_mut(&mut self) -> Result<&mut S::Segment> {
        self.active
            .as_mut()
            .ok_or_else(|| IndexError::NoActiveSegment("no bucket activated".to_string()))
    }

    /// Flush the active segment, if any.
    pub fn flush(&mut self) -> Result<()> {
        match self.active.as_mut() {
            Some(segment) => segment.flush(),
            None => Ok(()),
        }
    }
}
