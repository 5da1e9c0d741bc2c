//! Archive buckets: the `(list, period)` partition every message belongs to.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::error::{IndexError, Result};

/// Granularity of an archive file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    /// A whole year (`debian-project-2007`).
    Year(i32),
    /// One month of a year (`debian-project-200709`).
    Month(i32, u32),
}

/// A mailing list together with the period one archive file covers.
///
/// The bucket drives segment selection, the stored document keys and the
/// date sanity window, so its boundaries are computed once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    list: String,
    period: Period,
    start: DateTime<Utc>,
    next_start: DateTime<Utc>,
}

impl Bucket {
    /// Create a bucket, validating the calendar fields.
    pub fn new(list: impl Into<String>, period: Period) -> Result<Self> {
        let list = list.into();
        let (start, next_start) = match period {
            Period::Year(year) => (first_instant(year, 1), first_instant(year + 1, 1)),
            Period::Month(year, month) if (1..=12).contains(&month) => {
                let (next_year, next_month) = if month == 12 {
                    (year + 1, 1)
                } else {
                    (year, month + 1)
                };
                (
                    first_instant(year, month),
                    first_instant(next_year, next_month),
                )
            }
            Period::Month(_, _) => (None, None),
        };
        match (start, next_start) {
            (Some(start), Some(next_start)) if !list.is_empty() => Ok(Self {
                list,
                period,
                start,
                next_start,
            }),
            _ => Err(IndexError::InvalidArchiveName(format!(
                "{list}-{}",
                period_digits(period)
            ))),
        }
    }

    /// Derive the bucket from an archive file name such as
    /// `/srv/lists/debian-project/2007/debian-project-200709`.
    ///
    /// The list name is everything before the last `-`; the suffix must be
    /// `YYYY` or `YYYYMM`.
    pub fn from_archive_path(path: &Path) -> Result<Self> {
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let invalid = || IndexError::InvalidArchiveName(basename.clone());

        let (list, digits) = basename.rsplit_once('-').ok_or_else(invalid)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let period = match digits.len() {
            4 => Period::Year(digits.parse().map_err(|_| invalid())?),
            6 => Period::Month(
                digits[..4].parse().map_err(|_| invalid())?,
                digits[4..].parse().map_err(|_| invalid())?,
            ),
            _ => return Err(invalid()),
        };
        Self::new(list, period).map_err(|_| invalid())
    }

    /// Mailing-list name.
    pub fn list(&self) -> &str {
        &self.list
    }

    /// Archive period.
    pub fn period(&self) -> Period {
        self.period
    }

    pub fn year(&self) -> i32 {
        self.start.year()
    }

    /// Month number, `0` for yearly buckets.
    pub fn month(&self) -> u32 {
        match self.period {
            Period::Year(_) => 0,
            Period::Month(_, month) => month,
        }
    }

    /// Bucket key as used in the bucket term and the segment map:
    /// `<list>-<YYYYMM>` or `<list>-<YYYY>`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.list, period_digits(self.period))
    }

    /// First instant of the bucket.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// First instant of the following bucket.
    pub fn next_start(&self) -> DateTime<Utc> {
        self.next_start
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

fn first_instant(year: i32, month: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn period_digits(period: Period) -> String {
    match period {
        Period::Year(year) => format!("{year:04}"),
        Period::Month(year, month) => format!("{year:04}{month:02}"),
    }
}
