//! Archive discovery under a list-archive tree.
//!
//! ```text
//! <mbox_dir>/<list>/<list>-YYYY            yearly archives
//! <mbox_dir>/<list>/YYYY/<list>-YYYYMM     monthly archives
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{IndexError, Result};

/// Archive files of `lists` under `mbox_dir`, each list's files sorted by
/// path. An empty `lists` means every subdirectory of `mbox_dir`, in name
/// order.
pub fn discover_archives(mbox_dir: &Path, lists: &[String]) -> Result<Vec<PathBuf>> {
    if !mbox_dir.is_dir() {
        return Err(IndexError::FileNotFound(mbox_dir.to_path_buf()));
    }
    let lists = if lists.is_empty() {
        list_directories(mbox_dir)?
    } else {
        lists.to_vec()
    };

    let mut archives = Vec::new();
    for list in &lists {
        let found = list_archives(mbox_dir, list)?;
        if found.is_empty() {
            warn!(list = %list, dir = %mbox_dir.display(), "No archives found for list");
        } else {
            debug!(list = %list, archives = found.len(), "Discovered archives");
        }
        archives.extend(found);
    }
    info!(lists = lists.len(), archives = archives.len(), "Archive discovery done");
    Ok(archives)
}

fn list_directories(mbox_dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(mbox_dir).map_err(|e| IndexError::io(mbox_dir, e))?;
    let mut lists = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IndexError::io(mbox_dir, e))?;
        if entry.path().is_dir() {
            lists.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    lists.sort();
    Ok(lists)
}

fn list_archives(mbox_dir: &Path, list: &str) -> Result<Vec<PathBuf>> {
    let root = glob::Pattern::escape(&mbox_dir.to_string_lossy());
    let name = glob::Pattern::escape(list);
    let year = "[0-9][0-9][0-9][0-9]";
    let patterns = [
        format!("{root}/{name}/{name}-{year}"),
        format!("{root}/{name}/{year}/{name}-{year}[0-9][0-9]"),
    ];

    let mut found = Vec::new();
    for pattern in &patterns {
        let entries = glob::glob(pattern)
            .map_err(|e| IndexError::Config(format!("bad archive pattern '{pattern}': {e}")))?;
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => found.push(path),
                Ok(path) => debug!(path = %path.display(), "Not a file, skipping"),
                Err(e) => warn!(error = %e, "Unreadable path in archive tree"),
            }
        }
    }
    found.sort();
    Ok(found)
}
