use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::solar::Site;

/// One observing night: its working directory and the sunrise that ends it.
#[derive(Debug, Clone)]
pub struct ObservingNight {
    tag: String,
    directory: PathBuf,
    sunrise: DateTime<Utc>,
}

impl ObservingNight {
    pub fn new(directory: PathBuf, sunrise: DateTime<Utc>) -> Result<Self> {
        let tag = directory
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                Error::Config(format!("night directory has no name: {}", directory.display()))
            })?;

        Ok(Self {
            tag,
            directory,
            sunrise,
        })
    }

    /// Start a night at `now`, resolving the directory from the config when
    /// none is given and computing the next sunrise for the site.
    pub fn start(config: &Config, directory: Option<PathBuf>, now: DateTime<Utc>) -> Result<Self> {
        let directory = match directory {
            Some(dir) => std::path::absolute(&dir).unwrap_or(dir),
            None => default_night_dir(config, now),
        };
        let sunrise = Site::from(&config.observatory).next_sunrise(now)?;
        Self::new(directory, sunrise)
    }

    /// UT-date tag, the basename of the night directory.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn sunrise(&self) -> DateTime<Utc> {
        self.sunrise
    }

    pub fn is_over(&self, now: DateTime<Utc>) -> bool {
        now >= self.sunrise
    }
}

/// `<photpath>/<YYYYMMDD>` for the UTC date of `now`.
pub fn default_night_dir(config: &Config, now: DateTime<Utc>) -> PathBuf {
    config
        .paths
        .photpath
        .join(now.format("%Y%m%d").to_string())
}
