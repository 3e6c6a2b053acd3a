use std::path::{Path, PathBuf};

use getset::Getters;
use home::home_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const API_URL_ENV: &str = "TASKPLEX_API_URL";

const ROOT_DIR_NAME: &str = ".taskplex";
const CONFIG_FILE_NAME: &str = "config.json";
const PREFERENCES_FILE_NAME: &str = "preferences.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot get home dir")]
    HomeNotAvailable,

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// On-disk shape of `config.json`; every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Getters)]
#[get = "pub"]
pub struct Config {
    api_url: String,
    root_dir: PathBuf,
    preferences_file: PathBuf,
}

impl Config {
    /// Loads `~/.taskplex/config.json`, then applies the environment override.
    pub async fn init() -> Result<Self> {
        let root_dir = home_dir()
            .ok_or(ConfigError::HomeNotAvailable)?
            .join(ROOT_DIR_NAME);

        Self::load_from(&root_dir).await
    }

    pub async fn load_from(root_dir: &Path) -> Result<Self> {
        let path = root_dir.join(CONFIG_FILE_NAME);

        let file = match async_std::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str::<ConfigFile>(&raw)
                .map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                ConfigFile::default()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        Ok(Self::resolve(root_dir, file, std::env::var(API_URL_ENV).ok()))
    }

    /// Environment beats file, file beats default. Blank values are ignored.
    pub fn resolve(root_dir: &Path, file: ConfigFile, env_api_url: Option<String>) -> Self {
        let api_url = env_api_url
            .filter(|url| !url.trim().is_empty())
            .or(file.api_url.filter(|url| !url.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            warn!(%api_url, "API url has no http(s) scheme");
        }

        Config {
            api_url,
            root_dir: root_dir.to_path_buf(),
            preferences_file: root_dir.join(PREFERENCES_FILE_NAME),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn env_overrides_file() {
        let file = ConfigFile {
            api_url: Some("http://file:9000".into()),
        };

        let config = Config::resolve(Path::new("/tmp/tp"), file.clone(), Some("http://env".into()));
        assert_eq!(config.api_url(), "http://env");

        let config = Config::resolve(Path::new("/tmp/tp"), file, Some("  ".into()));
        assert_eq!(config.api_url(), "http://file:9000");

        let config = Config::resolve(Path::new("/tmp/tp"), ConfigFile::default(), None);
        assert_eq!(config.api_url(), DEFAULT_API_URL);
        assert_eq!(config.preferences_file(), &Path::new("/tmp/tp").join("preferences.json"));
    }

    #[async_std::test]
    async fn rejects_malformed_config_file() {
        let tmp = tempdir().unwrap();
        async_std::fs::write(tmp.path().join("config.json"), "{ not json")
            .await
            .unwrap();

        let res = Config::load_from(tmp.path()).await;

        assert!(matches!(res, Err(ConfigError::Parse { .. })), "got {res:?}");
    }

    #[async_std::test]
    async fn missing_config_file_is_not_an_error() {
        let tmp = tempdir().unwrap();

        let config = Config::load_from(tmp.path()).await.unwrap();

        assert_eq!(config.root_dir(), &tmp.path().to_path_buf());
    }
}
