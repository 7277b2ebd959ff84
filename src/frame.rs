use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::classify::{self, Category};
use crate::clock::Clock;
use crate::fits::{FitsHeader, HeaderSource};

/// Header fields the loop cares about, lifted out of the FITS cards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameHeader {
    pub imgtype: Option<String>,
    pub objtype: Option<String>,
    pub object: Option<String>,
    pub objname: Option<String>,
    pub filter: Option<String>,
    pub exptime: f64,
    pub focpos: Option<f64>,
    pub request_id: Option<String>,
    /// UT date (YYYYMMDD) the frame was taken, from its file name or
    /// night directory.
    pub ut_date: Option<u32>,
}

impl FrameHeader {
    pub fn from_fits(header: &FitsHeader, ut_date: Option<u32>) -> Self {
        Self {
            imgtype: header.get_text("IMGTYPE"),
            objtype: header.get_text("OBJTYPE"),
            object: header.get_text("OBJECT"),
            objname: header.get_text("OBJNAME"),
            filter: header.get_text("FILTER"),
            exptime: header.get_f64("EXPTIME").unwrap_or(0.0),
            focpos: header.get_f64("FOCPOS"),
            request_id: header.get_text("REQ_ID"),
            ut_date,
        }
    }
}

/// A classified raw exposure.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub path: PathBuf,
    pub header: FrameHeader,
    pub category: Category,
}

impl RawFrame {
    pub fn new(path: PathBuf, header: FrameHeader) -> Self {
        let category = classify::classify(&header);
        Self {
            path,
            header,
            category,
        }
    }

    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }

    /// Title identifier: the file name after `rcYYYYMMDD_`, no extension.
    pub fn ut_id(&self) -> String {
        crate::manifest::ut_id_from_name(&self.file_name())
    }

    pub fn cosmic_ray_rejection(&self) -> bool {
        classify::cosmic_ray_rejection(self.header.exptime)
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// UT date of a frame: `rcYYYYMMDD_...` in the file name, else a
/// `YYYYMMDD` parent directory.
pub fn ut_date_from_path(path: &Path) -> Option<u32> {
    let parse = |s: &str| -> Option<u32> {
        if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
            s.parse().ok()
        } else {
            None
        }
    };

    let from_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.get(2..10))
        .and_then(parse);

    from_name.or_else(|| {
        path.parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .and_then(parse)
    })
}

/// Read and classify a freshly written frame.
///
/// The instrument may still be writing the header when the file shows up,
/// so a missing IMGTYPE (or an unreadable header) gets one more look after
/// `retry_delay`. Returns `None` when the second look fails too.
pub async fn read_frame(
    path: &Path,
    headers: &dyn HeaderSource,
    clock: &dyn Clock,
    retry_delay: Duration,
) -> Option<RawFrame> {
    let attempt = || match headers.read_header(path) {
        Ok(header) if header.contains("IMGTYPE") => Some(header),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Header not readable yet for {}: {}", path.display(), e);
            None
        }
    };

    let header = match attempt() {
        Some(header) => header,
        None => {
            warn!("Image {} does not have an IMGTYPE", path.display());
            clock.sleep(retry_delay).await;
            match attempt() {
                Some(header) => header,
                None => {
                    warn!("Image {} STILL does not have an IMGTYPE, skipping", path.display());
                    return None;
                }
            }
        }
    };

    let frame_header = FrameHeader::from_fits(&header, ut_date_from_path(path));
    Some(RawFrame::new(path.to_path_buf(), frame_header))
}
