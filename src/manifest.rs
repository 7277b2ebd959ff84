//! The nightly what-list: one line per exposure, first token the file name.

use std::path::{Path, PathBuf};

use crate::calibration::CalibrationCounts;
use crate::error::{Error, Result};

pub const WHATLIST_NAME: &str = "rcwhat.list";
pub const WHATLIST_LINK: &str = "rcwhat.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub line: String,
}

impl ManifestEntry {
    pub fn file_name(&self) -> Option<&str> {
        self.line.split_whitespace().next()
    }

    /// Identifier used in plot titles: everything after the first `_`,
    /// without extension (`rc20240502_03_04_05.fits` -> `03_04_05`).
    pub fn ut_id(&self) -> Option<String> {
        self.file_name().map(ut_id_from_name)
    }
}

pub fn ut_id_from_name(name: &str) -> String {
    let rest: Vec<&str> = name.split('_').skip(1).collect();
    let joined = rest.join("_");
    joined.split('.').next().unwrap_or("").to_string()
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(WHATLIST_NAME)
    }

    pub fn exists_in(dir: &Path) -> bool {
        Self::path_in(dir).is_file()
    }

    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| ManifestEntry {
                line: l.to_string(),
            })
            .collect();
        Self { entries }
    }

    pub async fn load(dir: &Path) -> Result<Self> {
        let path = Self::path_in(dir);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::Manifest(format!("cannot read {}: {e}", path.display())))?;
        Ok(Self::parse(&content))
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    fn count_containing(&self, needle: &str) -> usize {
        self.entries.iter().filter(|e| e.line.contains(needle)).count()
    }

    pub fn has_acquisition(&self) -> bool {
        self.count_containing("ACQ") > 0
    }

    /// Calibration-frame counts as seen by the what-list. Focus runs mark
    /// the end of evening twilight flats.
    pub fn calibration_counts(&self) -> CalibrationCounts {
        CalibrationCounts {
            bias: self.count_containing("bias"),
            dome: self.count_containing("dome"),
            focus_or_twilight: self.count_containing("FOCUS"),
        }
    }
}

/// Create `rcwhat.txt -> rcwhat.list` unless a link is already there.
#[cfg(unix)]
pub fn link_whatlist(dir: &Path) -> Result<bool> {
    let link = dir.join(WHATLIST_LINK);
    if link.symlink_metadata().is_ok() {
        return Ok(false);
    }
    std::os::unix::fs::symlink(Manifest::path_in(dir), &link)?;
    Ok(true)
}

#[cfg(not(unix))]
pub fn link_whatlist(dir: &Path) -> Result<bool> {
    let link = dir.join(WHATLIST_LINK);
    if link.exists() {
        return Ok(false);
    }
    std::fs::copy(Manifest::path_in(dir), &link)?;
    Ok(true)
}
