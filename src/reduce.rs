//! Calls into the external reduction package.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::CommandsConfig;
use crate::error::Result;
use crate::frame::RawFrame;
use crate::products::ReducedProduct;
use crate::subprocess::{ProcessCommandBuilder, ProcessError, SubprocessManager};

/// The reduction package: per-frame reduction and master calibrations.
#[async_trait]
pub trait Reducer: Send + Sync {
    /// Reduce one raw frame, returning the paths it produced.
    async fn reduce_image(&self, path: &Path, cosmic: bool) -> Result<Vec<PathBuf>>;

    async fn create_master_bias(&self, directory: &Path) -> Result<()>;

    async fn create_master_flat(&self, directory: &Path, twilight: bool) -> Result<()>;
}

/// Reducer backed by configured command lines.
///
/// `reduce` receives `[--cosmic] <frame>` and prints one product path per
/// line; relative paths are taken against the frame's directory. Master
/// builds receive the night directory (`master_flat` also `--twilight`).
pub struct CommandReducer {
    subprocess: SubprocessManager,
    commands: CommandsConfig,
}

impl CommandReducer {
    pub fn new(subprocess: SubprocessManager, commands: CommandsConfig) -> Self {
        Self {
            subprocess,
            commands,
        }
    }

    fn builder(argv: &[String], name: &'static str) -> Result<ProcessCommandBuilder> {
        Ok(ProcessCommandBuilder::from_argv(argv).ok_or(ProcessError::NotConfigured(name))?)
    }
}

#[async_trait]
impl Reducer for CommandReducer {
    async fn reduce_image(&self, path: &Path, cosmic: bool) -> Result<Vec<PathBuf>> {
        let frame_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut builder = Self::builder(&self.commands.reduce, "reduce")?
            .current_dir(frame_dir)
            .timeout(self.commands.timeout);
        if cosmic {
            builder = builder.arg("--cosmic");
        }
        let output = self
            .subprocess
            .run_checked(builder.path_arg(path).build())
            .await?;

        Ok(output
            .stdout_lines()
            .map(|line| {
                let p = PathBuf::from(line);
                if p.is_absolute() {
                    p
                } else {
                    frame_dir.join(p)
                }
            })
            .collect())
    }

    async fn create_master_bias(&self, directory: &Path) -> Result<()> {
        let command = Self::builder(&self.commands.master_bias, "master_bias")?
            .current_dir(directory)
            .timeout(self.commands.timeout)
            .path_arg(directory)
            .build();
        self.subprocess.run_checked(command).await?;
        Ok(())
    }

    async fn create_master_flat(&self, directory: &Path, twilight: bool) -> Result<()> {
        let mut builder = Self::builder(&self.commands.master_flat, "master_flat")?
            .current_dir(directory)
            .timeout(self.commands.timeout);
        if twilight {
            builder = builder.arg("--twilight");
        }
        self.subprocess
            .run_checked(builder.path_arg(directory).build())
            .await?;
        Ok(())
    }
}

/// Reduce one frame in isolation: any failure is logged and yields no
/// products, so one bad frame never stops the night.
pub async fn reduce_frame(frame: &RawFrame, reducer: &dyn Reducer) -> Vec<ReducedProduct> {
    let cosmic = frame.cosmic_ray_rejection();
    info!(
        "Reducing {} ({}, {:.0}s, cosmic={})",
        frame.path.display(),
        frame.category,
        frame.header.exptime,
        cosmic
    );
    match reducer.reduce_image(&frame.path, cosmic).await {
        Ok(paths) => paths.into_iter().map(ReducedProduct::new).collect(),
        Err(e) => {
            warn!("Reduction failed for {}: {}", frame.path.display(), e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::frame::FrameHeader;
    use crate::testing::mocks::MockReducer;

    fn frame(exptime: f64) -> RawFrame {
        RawFrame::new(
            PathBuf::from("/d/rc20240502_03_00_00.fits"),
            FrameHeader {
                imgtype: Some("SCIENCE".into()),
                exptime,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_cosmic_flag_follows_exposure_time() {
        let reducer = MockReducer::new();
        reduce_frame(&frame(45.0), &reducer).await;
        reduce_frame(&frame(10.0), &reducer).await;
        let calls = reducer.reduce_calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].1);
        assert!(!calls[1].1);
    }

    #[tokio::test]
    async fn test_failure_yields_no_products() {
        let reducer = MockReducer::new();
        reducer.fail_reduction_of(Path::new("/d/rc20240502_03_00_00.fits"));
        assert!(reduce_frame(&frame(45.0), &reducer).await.is_empty());
    }

    #[tokio::test]
    async fn test_command_reducer_arguments_and_output() {
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("rcred")
            .with_args(|args| args.first().map(String::as_str) == Some("reduce"))
            .returns_stdout("reduced/rc1_ZTF_r_r.fits\n/abs/rc1_ZTF_g_g.fits\n\n")
            .finish();
        let reducer = CommandReducer::new(subprocess, CommandsConfig::default());

        let paths = reducer
            .reduce_image(Path::new("/d/rc1.fits"), true)
            .await
            .unwrap();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/d/reduced/rc1_ZTF_r_r.fits"),
                PathBuf::from("/abs/rc1_ZTF_g_g.fits")
            ]
        );
        let history = mock.get_call_history();
        assert_eq!(history[0].args, ["reduce", "--cosmic", "/d/rc1.fits"]);
    }

    #[tokio::test]
    async fn test_command_reducer_failure_is_error() {
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("rcred")
            .returns_exit_code(1)
            .returns_stderr("bad frame")
            .finish();
        let reducer = CommandReducer::new(subprocess, CommandsConfig::default());
        let err = reducer
            .reduce_image(Path::new("/d/rc1.fits"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Process(ProcessError::Failed { .. })));
    }

    #[tokio::test]
    async fn test_master_flat_twilight_flag() {
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("rcred").finish();
        let reducer = CommandReducer::new(subprocess, CommandsConfig::default());
        reducer
            .create_master_flat(Path::new("/d"), true)
            .await
            .unwrap();
        reducer.create_master_bias(Path::new("/d")).await.unwrap();
        let history = mock.get_call_history();
        assert_eq!(history[0].args, ["masterflat", "--twilight", "/d"]);
        assert_eq!(history[1].args, ["masterbias", "/d"]);
    }
}
