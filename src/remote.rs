//! Copies reduced products to the archive host.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::subprocess::{ProcessCommandBuilder, SubprocessManager};

const REMOTE_TIMEOUT: Duration = Duration::from_secs(300);

#[async_trait]
pub trait RemoteCopier: Send + Sync {
    /// Create the destination directory for `night`.
    async fn prepare(&self, night: &str) -> Result<()>;

    async fn copy(&self, path: &Path, night: &str) -> Result<()>;
}

/// `ssh`/`scp` to `<user>@<host>:<root>/<night>/`.
pub struct ScpCopier {
    subprocess: SubprocessManager,
    remote: RemoteConfig,
}

impl ScpCopier {
    pub fn new(subprocess: SubprocessManager, remote: RemoteConfig) -> Self {
        Self { subprocess, remote }
    }

    fn destination(&self, night: &str) -> PathBuf {
        self.remote.root.join(night)
    }
}

#[async_trait]
impl RemoteCopier for ScpCopier {
    async fn prepare(&self, night: &str) -> Result<()> {
        let command = ProcessCommandBuilder::new("ssh")
            .args(["-l", self.remote.user.as_str(), self.remote.host.as_str(), "mkdir"])
            .path_arg(&self.destination(night))
            .timeout(REMOTE_TIMEOUT)
            .build();
        info!("{}", command.display());
        self.subprocess
            .run_checked(command)
            .await
            .map_err(|e| Error::Remote(e.to_string()))?;
        Ok(())
    }

    async fn copy(&self, path: &Path, night: &str) -> Result<()> {
        let target = format!(
            "{}@{}:{}/",
            self.remote.user,
            self.remote.host,
            self.destination(night).display()
        );
        let command = ProcessCommandBuilder::new("scp")
            .path_arg(path)
            .arg(&target)
            .timeout(REMOTE_TIMEOUT)
            .build();
        info!("{}", command.display());
        self.subprocess
            .run_checked(command)
            .await
            .map_err(|e| Error::Remote(e.to_string()))?;
        info!("Successfully copied the image: {}", path.display());
        Ok(())
    }
}
