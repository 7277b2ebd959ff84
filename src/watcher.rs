//! New-frame detection by directory listing and set difference.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Raw frames written by the instrument: `rcYYYYMMDD_HH_MM_SS.fits`.
pub const RAW_FRAME_PATTERN: &str = "rc*[0-9].fits";

/// Paths already observed tonight. Append-only, insertion ordered.
#[derive(Debug, Clone, Default)]
pub struct SeenFileSet {
    order: Vec<PathBuf>,
    index: HashSet<PathBuf>,
}

impl SeenFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.index.contains(path)
    }

    pub fn insert(&mut self, path: PathBuf) -> bool {
        if self.index.insert(path.clone()) {
            self.order.push(path);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.order.iter()
    }
}

/// `pattern` anchored in `directory`, with the directory part escaped so
/// that `[`, `*` or `?` in a path are matched literally.
pub fn pattern_in(directory: &Path, pattern: &str) -> String {
    let dir = glob::Pattern::escape(&directory.to_string_lossy());
    let sep = std::path::MAIN_SEPARATOR;
    if dir.ends_with(sep) {
        format!("{dir}{pattern}")
    } else {
        format!("{dir}{sep}{pattern}")
    }
}

/// List `pattern` in `directory` and split out what has not been seen.
///
/// New files come back sorted by name, which for the instrument's naming
/// is chronological.
pub fn poll(
    directory: &Path,
    pattern: &str,
    mut previously_seen: SeenFileSet,
) -> Result<(Vec<PathBuf>, SeenFileSet)> {
    let full_pattern = pattern_in(directory, pattern);
    let entries = glob::glob(&full_pattern)
        .map_err(|e| Error::Config(format!("invalid watch pattern {full_pattern}: {e}")))?;

    let mut new_files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::debug!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|path| !previously_seen.contains(path))
        .collect();
    new_files.sort();
    new_files.dedup();

    for path in &new_files {
        previously_seen.insert(path.clone());
    }
    Ok((new_files, previously_seen))
}

/// Stateful wrapper used by the session loop.
#[derive(Debug)]
pub struct ArrivalWatcher {
    directory: PathBuf,
    pattern: String,
    seen: SeenFileSet,
    empty_polls: u32,
}

impl ArrivalWatcher {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self::with_pattern(directory, RAW_FRAME_PATTERN)
    }

    pub fn with_pattern(directory: impl Into<PathBuf>, pattern: &str) -> Self {
        Self {
            directory: directory.into(),
            pattern: pattern.to_string(),
            seen: SeenFileSet::new(),
            empty_polls: 0,
        }
    }

    pub fn poll(&mut self) -> Result<Vec<PathBuf>> {
        let (new_files, seen) = poll(&self.directory, &self.pattern, self.seen.clone())?;
        self.seen = seen;
        if new_files.is_empty() {
            self.empty_polls += 1;
        } else {
            self.empty_polls = 0;
        }
        Ok(new_files)
    }

    /// Consecutive polls that returned nothing.
    pub fn empty_polls(&self) -> u32 {
        self.empty_polls
    }

    pub fn seen(&self) -> &SeenFileSet {
        &self.seen
    }
}
