use std::path::{Path, PathBuf};

use crate::fits::HeaderSource;
use crate::frame::file_name_of;

/// One output of the reduction step, e.g. a per-filter extraction
/// `rc20240502_03_00_00_ZTF24aaabcde_r_r.fits`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducedProduct {
    pub path: PathBuf,
}

impl ReducedProduct {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }

    /// File name up to the first `.`.
    pub fn stem(&self) -> String {
        let name = self.file_name();
        name.split('.').next().unwrap_or_default().to_string()
    }

    /// The last two `_` tokens of the file name, extension stripped.
    pub fn filter_tokens(&self) -> Option<(String, String)> {
        let name = self.file_name();
        let mut tokens: Vec<&str> = name.split('_').collect();
        if tokens.len() < 2 {
            return None;
        }
        let last = tokens.pop()?;
        let last = last.split('.').next().unwrap_or_default();
        let second_last = tokens.pop()?;
        Some((second_last.to_string(), last.to_string()))
    }

    /// Per-filter products repeat the filter token (`..._r_r.fits`); the
    /// full-frame product does not.
    pub fn has_paired_filter(&self) -> bool {
        self.filter_tokens().is_some_and(|(a, b)| a == b)
    }

    /// Preview written next to the product: `<dir>/png/<stem>.png`.
    pub fn preview_path(&self) -> PathBuf {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        dir.join("png").join(format!("{}.png", self.stem()))
    }

    pub fn on_target(&self, headers: &dyn HeaderSource) -> bool {
        match headers.get_header_field(&self.path, "ONTARGET") {
            Ok(Some(value)) => value.as_bool(),
            Ok(None) => false,
            Err(e) => {
                tracing::debug!("Cannot read ONTARGET for {}: {}", self.path.display(), e);
                false
            }
        }
    }

    /// Target name and filter from the `OBJECT` card ("<name> ... <filter>").
    pub fn target(&self, headers: &dyn HeaderSource) -> Option<(String, String)> {
        let object = headers
            .get_header_field(&self.path, "OBJECT")
            .ok()
            .flatten()?
            .to_text();
        let mut parts = object.split_whitespace();
        let name = parts.next()?.to_string();
        let filter = parts.last().unwrap_or(&name).to_string();
        Some((name, filter))
    }
}
