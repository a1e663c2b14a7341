//! Application configuration.
//!
//! Values are layered: built-in defaults, then `config.toml` in the user's
//! config directory, then `PATLIMER_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::info;

use crate::session::DEFAULT_RACE_NAME;

const APP_DIR: &str = "patlimer";
const CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "PATLIMER";

const DEFAULT_CONFIG: &str = r#"# PatLimer configuration

# "local" runs the backend in-process and persists to data_dir.
# "remote" sends commands to backend_url.
backend = "local"
# backend_url = "http://127.0.0.1:8080"

request_timeout_secs = 10
race_name = "Race"
"#;

/// Which backend binding the session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// In-process backend with on-disk snapshots.
    #[default]
    Local,
    /// Backend reached over HTTP.
    Remote,
}

/// Resolved settings for one run.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Backend binding.
    pub backend: BackendMode,
    /// Base URL of the remote backend.
    pub backend_url: Option<String>,
    /// Per-request timeout for the remote backend.
    pub request_timeout_secs: u64,
    /// Directory for local backend snapshots.
    pub data_dir: PathBuf,
    /// Name given to newly created races.
    pub race_name: String,
}

impl AppConfig {
    /// Load from the default config file and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load with `path` as the file layer. A missing file is skipped.
    pub fn load_from(path: &Path) -> Result<Self> {
        let data_dir = default_data_dir()?;
        let settings = Config::builder()
            .set_default("backend", "local")?
            .set_default("request_timeout_secs", 10)?
            .set_default("data_dir", data_dir.to_string_lossy().to_string())?
            .set_default("race_name", DEFAULT_RACE_NAME)?
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.backend == BackendMode::Remote
            && self.backend_url.as_deref().map_or(true, |url| url.trim().is_empty())
        {
            bail!("backend = \"remote\" requires backend_url");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

/// Write the commented default config file if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path()?;
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "wrote default config");
    Ok(())
}

fn app_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .context("could not determine the user config directory")
}

fn config_path() -> Result<PathBuf> {
    Ok(app_dir()?.join(CONFIG_FILE))
}

fn default_data_dir() -> Result<PathBuf> {
    Ok(app_dir()?.join("data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_apply_without_a_file() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(&dir.path().join("missing.toml"))?;
        assert_eq!(config.backend, BackendMode::Local);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.race_name, "Race");
        assert!(config.data_dir.ends_with("patlimer/data"));
        Ok(())
    }

    #[test]
    fn file_overrides_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "backend = \"remote\"\nbackend_url = \"http://race.local\"\nrequest_timeout_secs = 3\nrace_name = \"Heat\"\n",
        )?;

        let config = AppConfig::load_from(&path)?;

        assert_eq!(config.backend, BackendMode::Remote);
        assert_eq!(config.backend_url.as_deref(), Some("http://race.local"));
        assert_eq!(config.request_timeout_secs, 3);
        assert_eq!(config.race_name, "Heat");
        Ok(())
    }

    #[test]
    fn remote_without_url_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "backend = \"remote\"\n")?;
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("backend_url"));
        Ok(())
    }

    #[test]
    fn zero_timeout_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "request_timeout_secs = 0\n")?;
        assert!(AppConfig::load_from(&path).is_err());
        Ok(())
    }

    #[test]
    fn default_template_parses_and_is_not_overwritten() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("config.toml");

        write_default_config(&path)?;
        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.backend, BackendMode::Local);

        fs::write(&path, "race_name = \"Custom\"\n")?;
        write_default_config(&path)?;
        assert_eq!(fs::read_to_string(&path)?, "race_name = \"Custom\"\n");
        Ok(())
    }
}
