use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub mod loader;

pub use loader::ConfigLoader;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "NIGHTSHIFT_CONFIG";

/// Get the platform configuration directory for nightshift
pub fn get_config_dir() -> Result<PathBuf> {
    ProjectDirs::from("org", "nightshift", "nightshift")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))
}

/// Session-wide configuration. Built once at start-up and never mutated
/// afterwards; components receive it behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub observatory: ObservatoryConfig,
    pub backup: BackupConfig,
    pub polling: PollingConfig,
    pub remote: RemoteConfig,
    pub commands: CommandsConfig,
    pub slack: SlackConfig,
    pub marshal: MarshalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root holding one directory per observing night.
    pub photpath: PathBuf,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservatoryConfig {
    pub name: String,
    pub latitude_deg: f64,
    /// East positive.
    pub longitude_deg: f64,
    /// Solar altitude defining sunrise.
    pub horizon_deg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub phot_backup_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    #[serde(with = "humantime_serde")]
    pub active_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub acquisition_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub whatlist_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub header_retry_delay: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub host: String,
    pub user: String,
    pub root: PathBuf,
}

/// Argument vectors for the external collaborators. The first element is
/// the program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub reduce: Vec<String>,
    pub master_bias: Vec<String>,
    pub master_flat: Vec<String>,
    pub plot: Vec<String>,
    pub photometry: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub token: Option<String>,
    pub channel: String,
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarshalConfig {
    pub status_url: String,
    pub token: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            photpath: PathBuf::from("/data/rc"),
            log_dir: None,
        }
    }
}

impl Default for ObservatoryConfig {
    fn default() -> Self {
        Self {
            name: "Palomar".to_string(),
            latitude_deg: 33.3563,
            longitude_deg: -116.8650,
            horizon_deg: 0.0,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            phot_backup_file: PathBuf::from("/data/rc/phot_backup.txt"),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            active_interval: Duration::from_secs(30),
            acquisition_interval: Duration::from_secs(60),
            whatlist_interval: Duration::from_secs(600),
            header_retry_delay: Duration::from_millis(500),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "archive.example.org".to_string(),
            user: "rcuser".to_string(),
            root: PathBuf::from("/archive/rc/reduced"),
        }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        let argv = |parts: &[&str]| parts.iter().map(|s| s.to_string()).collect();
        Self {
            reduce: argv(&["rcred", "reduce"]),
            master_bias: argv(&["rcred", "masterbias"]),
            master_flat: argv(&["rcred", "masterflat"]),
            plot: argv(&["rcplot"]),
            photometry: argv(&["rcphot"]),
            timeout: Duration::from_secs(1800),
        }
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: None,
            channel: "rc-report".to_string(),
            api_url: "https://slack.com/api/files.upload".to_string(),
        }
    }
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self {
            status_url: "https://fritz.science/api/followup_request/status".to_string(),
            token: None,
            timeout: Duration::from_secs(5),
            max_retries: 5,
            retry_delay_ms: 2000,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn merge_env_vars(&mut self) {
        if let Ok(photpath) = std::env::var("NIGHTSHIFT_PHOTPATH") {
            self.paths.photpath = PathBuf::from(photpath);
        }

        if let Ok(token) = std::env::var("NIGHTSHIFT_SLACK_TOKEN") {
            self.slack.token = Some(token);
        }

        if let Ok(token) = std::env::var("NIGHTSHIFT_MARSHAL_TOKEN") {
            self.marshal.token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let obs = &self.observatory;
        if !(-90.0..=90.0).contains(&obs.latitude_deg) {
            return Err(Error::Config(format!(
                "observatory.latitude_deg out of range: {}",
                obs.latitude_deg
            )));
        }
        if !(-180.0..=180.0).contains(&obs.longitude_deg) {
            return Err(Error::Config(format!(
                "observatory.longitude_deg out of range: {}",
                obs.longitude_deg
            )));
        }
        if self.commands.reduce.is_empty() {
            return Err(Error::Config("commands.reduce must name a program".into()));
        }
        let polling = &self.polling;
        if polling.active_interval.is_zero()
            || polling.acquisition_interval.is_zero()
            || polling.whatlist_interval.is_zero()
        {
            return Err(Error::Config("polling intervals must be non-zero".into()));
        }
        Ok(())
    }

    /// Whether a chat notification channel is available at all.
    pub fn slack_enabled(&self) -> bool {
        self.slack.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_fixed_intervals() {
        let config = Config::new();
        assert_eq!(config.polling.active_interval, Duration::from_secs(30));
        assert_eq!(config.polling.acquisition_interval, Duration::from_secs(60));
        assert_eq!(config.polling.whatlist_interval, Duration::from_secs(600));
        assert_eq!(config.polling.header_retry_delay, Duration::from_millis(500));
        assert!(config.validate().is_ok());
        assert!(!config.slack_enabled());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_str = r#"
[paths]
photpath = "/scratch/rc"

[polling]
active_interval = "15s"

[slack]
token = "xoxb-123"
"#;
        let config = Config::from_toml_str(toml_str).unwrap();
        assert_eq!(config.paths.photpath, PathBuf::from("/scratch/rc"));
        assert_eq!(config.polling.active_interval, Duration::from_secs(15));
        assert_eq!(config.polling.acquisition_interval, Duration::from_secs(60));
        assert_eq!(config.observatory.name, "Palomar");
        assert!(config.slack_enabled());
    }

    #[test]
    fn test_validate_rejects_bad_latitude() {
        let mut config = Config::new();
        config.observatory.latitude_deg = 123.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_reduce_command() {
        let mut config = Config::new();
        config.commands.reduce.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_slack_token_is_disabled() {
        let mut config = Config::new();
        config.slack.token = Some(String::new());
        assert!(!config.slack_enabled());
    }
}
