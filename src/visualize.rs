//! Preview images for raw frames and reduced products.
//!
//! Output names are deterministic, so an existing file means the preview
//! was already made and the render is skipped.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::config::CommandsConfig;
use crate::error::Result;
use crate::frame::{file_name_of, RawFrame};
use crate::products::ReducedProduct;
use crate::subprocess::{ProcessCommandBuilder, ProcessError, SubprocessManager};

pub const RAW_PREVIEW_DIR: &str = "pngraw";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    Raw,
    Processed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotRequest {
    pub source: PathBuf,
    pub output: PathBuf,
    pub title: String,
    pub kind: PreviewKind,
}

#[async_trait]
pub trait Plotter: Send + Sync {
    async fn render(&self, request: &PlotRequest) -> Result<()>;
}

/// Plotter backed by a command: `<plot> --kind raw|processed --title T
/// --output O <source>`.
pub struct CommandPlotter {
    subprocess: SubprocessManager,
    commands: CommandsConfig,
}

impl CommandPlotter {
    pub fn new(subprocess: SubprocessManager, commands: CommandsConfig) -> Self {
        Self {
            subprocess,
            commands,
        }
    }
}

#[async_trait]
impl Plotter for CommandPlotter {
    async fn render(&self, request: &PlotRequest) -> Result<()> {
        let kind = match request.kind {
            PreviewKind::Raw => "raw",
            PreviewKind::Processed => "processed",
        };
        let command = ProcessCommandBuilder::from_argv(&self.commands.plot)
            .ok_or(ProcessError::NotConfigured("plot"))?
            .args(["--kind", kind, "--title", request.title.as_str(), "--output"])
            .path_arg(&request.output)
            .path_arg(&request.source)
            .timeout(self.commands.timeout)
            .build();
        self.subprocess.run_checked(command).await?;
        Ok(())
    }
}

/// `pngraw/<category>/<name>.png` for master Bias/Flat files,
/// `pngraw/<category>/<name>_all.png` for everything else.
pub fn raw_preview_path(frame: &RawFrame) -> PathBuf {
    let dir = frame.path.parent().unwrap_or_else(|| Path::new("."));
    let name = file_name_of(&frame.path);
    let suffix = if name.contains("Bias") || name.contains("Flat") {
        ".png"
    } else {
        "_all.png"
    };
    let base = name
        .strip_suffix(".fits.gz")
        .or_else(|| name.strip_suffix(".fits"))
        .unwrap_or(&name);
    dir.join(RAW_PREVIEW_DIR)
        .join(frame.category.as_str())
        .join(format!("{base}{suffix}"))
}

pub fn raw_title(frame: &RawFrame, ut_id: Option<&str>) -> String {
    let h = &frame.header;
    let imgtype = h.imgtype.as_deref().unwrap_or("None");
    let filter = h.filter.as_deref().unwrap_or("NA");
    let exptime = h.exptime.trunc() as i64;
    let ut = ut_id.map(|u| format!(" {u}")).unwrap_or_default();

    if imgtype.to_uppercase().contains("FOCUS") {
        let focpos = h.focpos.unwrap_or(0.0);
        format!("{{{imgtype}}} {focpos:.2}{ut} {filter}-band [{exptime}s] ")
    } else {
        let name = h.object.as_deref().unwrap_or("None");
        format!("{{{imgtype}}}{ut} {name} {filter}-band [{exptime}s] ")
    }
}

/// Render `request` unless its output already exists. Returns whether a
/// render happened.
async fn render_once(plotter: &dyn Plotter, request: PlotRequest) -> Result<bool> {
    if request.output.is_file() {
        debug!("Exists: {}", request.output.display());
        return Ok(false);
    }
    if let Some(parent) = request.output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    plotter.render(&request).await?;
    info!("As {}", request.output.display());
    Ok(true)
}

pub async fn visualize_raw(
    frame: &RawFrame,
    ut_id: Option<&str>,
    plotter: &dyn Plotter,
) -> Result<bool> {
    let h = &frame.header;
    let request = PlotRequest {
        source: frame.path.clone(),
        output: raw_preview_path(frame),
        title: raw_title(frame, ut_id),
        kind: PreviewKind::Raw,
    };
    if !request.output.is_file() {
        info!(
            "Plotting raw {} {} image of {}: {}",
            h.imgtype.as_deref().unwrap_or("None"),
            h.filter.as_deref().unwrap_or("NA"),
            h.object.as_deref().unwrap_or("None"),
            frame.path.display()
        );
    }
    render_once(plotter, request).await
}

pub async fn visualize_product(
    product: &ReducedProduct,
    title: &str,
    plotter: &dyn Plotter,
) -> Result<bool> {
    let request = PlotRequest {
        source: product.path.clone(),
        output: product.preview_path(),
        title: title.to_string(),
        kind: PreviewKind::Processed,
    };
    render_once(plotter, request).await
}

/// Raw preview that never fails the caller.
pub async fn visualize_raw_logged(frame: &RawFrame, ut_id: Option<&str>, plotter: &dyn Plotter) {
    if let Err(e) = visualize_raw(frame, ut_id, plotter).await {
        error!("Could not plot image {}: {}", frame.path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameHeader;
    use crate::testing::mocks::MockPlotter;
    use tempfile::TempDir;

    fn frame_at(path: PathBuf, imgtype: &str) -> RawFrame {
        RawFrame::new(
            path,
            FrameHeader {
                imgtype: Some(imgtype.into()),
                object: Some("ZTF24aaabcde".into()),
                filter: Some("r".into()),
                exptime: 45.0,
                focpos: Some(16.25),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_raw_preview_paths() {
        let f = frame_at(PathBuf::from("/d/rc20240502_03_00_00.fits"), "SCIENCE");
        assert_eq!(
            raw_preview_path(&f),
            PathBuf::from("/d/pngraw/science/rc20240502_03_00_00_all.png")
        );

        let gz = frame_at(PathBuf::from("/d/rc20240502_03_00_00.fits.gz"), "SCIENCE");
        assert_eq!(
            raw_preview_path(&gz),
            PathBuf::from("/d/pngraw/science/rc20240502_03_00_00_all.png")
        );

        let master = frame_at(PathBuf::from("/d/Bias_stats.fits"), "BIAS");
        assert_eq!(
            raw_preview_path(&master),
            PathBuf::from("/d/pngraw/bias/Bias_stats.png")
        );
    }

    #[test]
    fn test_titles() {
        let science = frame_at(PathBuf::from("/d/rc1.fits"), "SCIENCE");
        assert_eq!(
            raw_title(&science, Some("03_00_00")),
            "{SCIENCE} 03_00_00 ZTF24aaabcde r-band [45s] "
        );
        let focus = frame_at(PathBuf::from("/d/rc1.fits"), "FOCUS");
        assert_eq!(raw_title(&focus, None), "{FOCUS} 16.25 r-band [45s] ");
    }

    #[test]
    fn test_title_exposure_truncated() {
        let mut science = frame_at(PathBuf::from("/d/rc1.fits"), "SCIENCE");
        science.header.exptime = 45.7;
        assert!(raw_title(&science, None).ends_with("r-band [45s] "));
    }

    #[tokio::test]
    async fn test_raw_visualization_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let f = frame_at(temp.path().join("rc20240502_03_00_00.fits"), "SCIENCE");
        let plotter = MockPlotter::new();

        assert!(visualize_raw(&f, None, &plotter).await.unwrap());
        assert!(!visualize_raw(&f, None, &plotter).await.unwrap());
        assert_eq!(plotter.requests().len(), 1);
        assert!(raw_preview_path(&f).is_file());
    }

    #[tokio::test]
    async fn test_product_visualization_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let product = ReducedProduct::new(temp.path().join("rc1_ZTF_r_r.fits"));
        let plotter = MockPlotter::new();

        assert!(visualize_product(&product, "t", &plotter).await.unwrap());
        assert!(!visualize_product(&product, "t", &plotter).await.unwrap());
        let requests = plotter.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, PreviewKind::Processed);
    }

    #[tokio::test]
    async fn test_command_plotter_arguments() {
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("rcplot").finish();
        let plotter = CommandPlotter::new(subprocess, CommandsConfig::default());
        plotter
            .render(&PlotRequest {
                source: PathBuf::from("/d/rc1.fits"),
                output: PathBuf::from("/d/pngraw/science/rc1_all.png"),
                title: "{SCIENCE} x".into(),
                kind: PreviewKind::Raw,
            })
            .await
            .unwrap();
        let history = mock.get_call_history();
        assert_eq!(
            history[0].args,
            [
                "--kind",
                "raw",
                "--title",
                "{SCIENCE} x",
                "--output",
                "/d/pngraw/science/rc1_all.png",
                "/d/rc1.fits"
            ]
        );
    }
}
