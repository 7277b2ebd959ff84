//! Relay of the focus-loop plots written by the telescope software.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::frame::file_name_of;
use crate::notify::{Notification, Notifier};
use crate::visualize::RAW_PREVIEW_DIR;
use crate::watcher::pattern_in;

pub const FOCUS_PLOT_PATTERN: &str = "rcfocus*.png";
pub const FOCUS_CAPTION: &str = "RC FOCUS";

#[cfg(unix)]
fn link(source: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, link)
}

#[cfg(not(unix))]
fn link(source: &Path, link: &Path) -> std::io::Result<()> {
    std::fs::copy(source, link).map(|_| ())
}

/// Link each new `rcfocus*.png` into `pngraw/focus/` and push it once.
/// Returns the plots linked on this call.
pub async fn relay_focus_plots(
    dir: &Path,
    notifier: Option<&dyn Notifier>,
    channel: &str,
    local: bool,
) -> Result<Vec<PathBuf>> {
    let pattern = pattern_in(dir, FOCUS_PLOT_PATTERN);
    let mut plots: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| Error::Config(format!("bad focus plot pattern: {e}")))?
        .filter_map(|entry| entry.ok())
        .collect();
    plots.sort();

    let focus_dir = dir.join(RAW_PREVIEW_DIR).join("focus");
    let mut linked = Vec::new();
    for plot in plots {
        let name = file_name_of(&plot);
        let target = focus_dir.join(&name);
        if target.symlink_metadata().is_ok() {
            continue;
        }
        tokio::fs::create_dir_all(&focus_dir).await?;
        link(&plot, &target)?;
        info!("Linked focus plot {}", name);

        if !local {
            if let Some(notifier) = notifier {
                let notification = Notification {
                    image: plot.clone(),
                    caption: FOCUS_CAPTION.to_string(),
                    title: name,
                    channel: channel.to_string(),
                };
                if let Err(e) = notifier.push_image(&notification).await {
                    warn!("Cannot push {}: {}", plot.display(), e);
                }
            }
        }
        linked.push(plot);
    }
    Ok(linked)
}
