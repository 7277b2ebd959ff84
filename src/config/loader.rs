use super::{get_config_dir, Config, CONFIG_ENV_VAR};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Resolves and loads the session configuration.
///
/// Lookup order: an explicit path, then `NIGHTSHIFT_CONFIG`, then
/// `config.toml` in the platform config directory. When none of these
/// exist the built-in defaults are used. Environment overrides are applied
/// last and the result is validated before it is handed out.
pub struct ConfigLoader {
    explicit: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }

    pub fn resolve_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(path));
        }
        get_config_dir()
            .ok()
            .map(|dir| dir.join("config.toml"))
            .filter(|path| path.exists())
    }

    pub async fn load(&self) -> Result<Config> {
        let mut config = match self.resolve_path() {
            Some(path) => Self::load_file(&path).await?,
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Config::new()
            }
        };

        config.merge_env_vars();
        config.validate()?;
        Ok(config)
    }

    async fn load_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        let config = Config::from_toml_str(&content)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("night.toml");
        std::fs::write(
            &path,
            r#"
[observatory]
name = "Kitt Peak"
latitude_deg = 31.96
longitude_deg = -111.6
"#,
        )
        .unwrap();

        let config = ConfigLoader::new(Some(path)).load().await.unwrap();
        assert_eq!(config.observatory.name, "Kitt Peak");
        assert!((config.observatory.latitude_deg - 31.96).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_config_error() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::new(Some(temp.path().join("absent.toml")));
        assert!(matches!(loader.load().await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_invalid_values_fail_validation() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        std::fs::write(&path, "[observatory]\nlongitude_deg = 400.0\n").unwrap();
        assert!(ConfigLoader::new(Some(path)).load().await.is_err());
    }
}
