//! End-of-night compression and the backup hand-off file.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Result;
use crate::watcher::pattern_in;

pub const REDUCED_DIR: &str = "reduced";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressionReport {
    /// Top-level raw frames compressed.
    pub raw: usize,
    /// Frames under `reduced/` compressed.
    pub reduced: usize,
}

fn fits_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = pattern_in(dir, "*.fits");
    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| crate::error::Error::Config(format!("bad glob pattern: {e}")))?
        .filter_map(|entry| entry.ok())
        .collect();
    files.sort();
    Ok(files)
}

/// Regular files only: symlinks and anything else are left alone.
fn is_plain_file(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|m| m.file_type().is_file())
        .unwrap_or(false)
}

/// Replace `path` with `path.gz`.
pub fn gzip_file(path: &Path) -> Result<PathBuf> {
    let mut target = path.as_os_str().to_owned();
    target.push(".gz");
    let target = PathBuf::from(target);

    let mut input = BufReader::new(File::open(path)?);
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(&target)?), Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.into_inner().map_err(|e| e.into_error())?;
    std::fs::remove_file(path)?;
    Ok(target)
}

fn gzip_all(files: impl IntoIterator<Item = PathBuf>) -> usize {
    let mut count = 0;
    for file in files {
        match gzip_file(&file) {
            Ok(_) => count += 1,
            Err(e) => warn!("Could not gzip {}: {}", file.display(), e),
        }
    }
    count
}

/// Compress the night's frames. Master calibrations (names containing
/// `Bias` or `Flat`) at the top level stay uncompressed for later nights.
pub fn gzip_fits_files(dir: &Path) -> Result<CompressionReport> {
    let raw = fits_in(dir)?.into_iter().filter(|f| {
        let name = f.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        !name.contains("Bias") && !name.contains("Flat") && is_plain_file(f)
    });
    let raw = gzip_all(raw);

    let reduced_dir = dir.join(REDUCED_DIR);
    let reduced = if reduced_dir.is_dir() {
        gzip_all(fits_in(&reduced_dir)?.into_iter().filter(|f| is_plain_file(f)))
    } else {
        0
    };

    info!(
        "Compressed {} raw and {} reduced frames in {}",
        raw,
        reduced,
        dir.display()
    );
    Ok(CompressionReport { raw, reduced })
}

/// Write the night tag to the backup file, replacing its contents.
pub fn record_backup(backup_file: &Path, tag: &str) -> Result<()> {
    std::fs::write(backup_file, format!("{tag}\n"))?;
    info!("{} written to {}, ready for rsync", tag, backup_file.display());
    Ok(())
}
