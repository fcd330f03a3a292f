//! Pipeline configuration.
//!
//! Read from a YAML file, then overridden by environment variables.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use ingestion::{FtpDirectorySource, HttpDirectorySource, LocalDirectorySource, RemoteSource};
use probe_common::DepthSet;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `postgres://...` or `sqlite:...`
    pub database_url: String,

    /// Local directory for raw dive files
    pub local_dir: PathBuf,

    /// Where raw files are synced from
    pub remote: RemoteConfig,

    /// Depths dives are resampled onto
    pub depth_set: DepthSetConfig,

    /// Files or dives processed concurrently
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:probe.db".to_string(),
            local_dir: PathBuf::from("data/raw"),
            remote: RemoteConfig::default(),
            depth_set: DepthSetConfig::default(),
            workers: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    /// The instrument's base-station FTP server
    #[default]
    Ftp,
    Http,
    Local,
}

/// Remote file server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub kind: RemoteKind,
    /// `ftp://host/dir` (`ftp`) or directory index URL (`http`)
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Mounted directory (`local`)
    pub directory: Option<PathBuf>,
    /// Raw file extension, without the dot
    pub extension: String,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kind: RemoteKind::Ftp,
            url: None,
            username: None,
            password: None,
            directory: None,
            extension: "txt".to_string(),
            timeout_secs: 300,
        }
    }
}

/// Either an explicit list of depths or a regular spacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DepthSetConfig {
    List(Vec<f64>),
    Regular { start: f64, step: f64, count: usize },
}

impl Default for DepthSetConfig {
    fn default() -> Self {
        DepthSetConfig::Regular {
            start: 0.5,
            step: 1.0,
            count: 20,
        }
    }
}

impl DepthSetConfig {
    pub fn build(&self) -> Result<DepthSet> {
        let set = match self {
            DepthSetConfig::List(depths) => DepthSet::new(depths.clone()),
            DepthSetConfig::Regular { start, step, count } => {
                DepthSet::regular(*start, *step, *count)
            }
        };
        Ok(set?)
    }
}

impl PipelineConfig {
    /// Load from `path` (if given and present) and apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let config = Self::from_yaml_str(&text)
                    .with_context(|| format!("Invalid config file {}", path.display()))?;
                info!(path = %path.display(), "Loaded configuration file");
                config
            }
            Some(path) => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply `DATABASE_URL`, `PROBE_LOCAL_DIR` and `PROBE_REMOTE_*`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(dir) = lookup("PROBE_LOCAL_DIR") {
            self.local_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("PROBE_REMOTE_URL") {
            self.remote.url = Some(url);
        }
        if let Some(user) = lookup("PROBE_REMOTE_USERNAME") {
            self.remote.username = Some(user);
        }
        if let Some(password) = lookup("PROBE_REMOTE_PASSWORD") {
            self.remote.password = Some(password);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.depth_set.build().context("Invalid depth_set")?;
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.database_url.trim().is_empty() {
            bail!("database_url is empty");
        }
        Ok(())
    }

    pub fn depth_set(&self) -> Result<DepthSet> {
        self.depth_set.build()
    }

    /// Build the configured remote source.
    pub fn remote_source(&self) -> Result<Arc<dyn RemoteSource>> {
        let timeout = Duration::from_secs(self.remote.timeout_secs);
        match self.remote.kind {
            RemoteKind::Ftp => {
                let url = self.remote_url()?;
                let source = FtpDirectorySource::new(
                    &url,
                    self.remote.username.clone(),
                    self.remote.password.clone(),
                    timeout,
                )?;
                Ok(Arc::new(source))
            }
            RemoteKind::Http => {
                let url = self.remote_url()?;
                let source = HttpDirectorySource::new(
                    url,
                    self.remote.username.clone(),
                    self.remote.password.clone(),
                    timeout,
                )?;
                Ok(Arc::new(source))
            }
            RemoteKind::Local => {
                let dir = self
                    .remote
                    .directory
                    .clone()
                    .ok_or_else(|| anyhow!("remote.directory is not set"))?;
                Ok(Arc::new(LocalDirectorySource::new(dir)))
            }
        }
    }

    fn remote_url(&self) -> Result<String> {
        self.remote
            .url
            .clone()
            .ok_or_else(|| anyhow!("remote.url (or PROBE_REMOTE_URL) is not set"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_use_canonical_depths() {
        let config = PipelineConfig::default();
        assert_eq!(config.depth_set().unwrap(), DepthSet::canonical());
        assert_eq!(config.remote.extension, "txt");
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn test_yaml_with_regular_depths() {
        let config = PipelineConfig::from_yaml_str(
            r#"
database_url: postgres://probe@db/probe
local_dir: /data/raw
workers: 4
remote:
  kind: http
  url: https://probe.example.org/exports/
  username: probe
depth_set:
  start: 1.0
  step: 2.0
  count: 3
"#,
        )
        .unwrap();

        assert_eq!(config.workers, 4);
        assert_eq!(config.remote.kind, RemoteKind::Http);
        assert_eq!(config.remote.timeout_secs, 300);
        assert_eq!(config.depth_set().unwrap().as_slice(), &[1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_yaml_with_depth_list_and_local_remote() {
        let config = PipelineConfig::from_yaml_str(
            r#"
remote:
  kind: local
  directory: /mnt/probe
depth_set: [2.5, 0.5, 1.5]
"#,
        )
        .unwrap();

        assert_eq!(config.depth_set().unwrap().as_slice(), &[0.5, 1.5, 2.5]);
        assert!(config.remote_source().is_ok());
        assert_eq!(config.database_url, "sqlite:probe.db");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite::memory:"),
            ("PROBE_LOCAL_DIR", "/tmp/probe"),
            ("PROBE_REMOTE_PASSWORD", "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = PipelineConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.local_dir, PathBuf::from("/tmp/probe"));
        assert_eq!(config.remote.password.as_deref(), Some("secret"));
        assert_eq!(config.remote.username, None);
    }

    #[test]
    fn test_invalid_depth_set_rejected() {
        let mut config = PipelineConfig::default();
        config.depth_set = DepthSetConfig::Regular {
            start: 0.5,
            step: 0.0,
            count: 3,
        };
        assert!(config.validate().is_err());

        config.depth_set = DepthSetConfig::List(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_remote_requires_url() {
        let mut config = PipelineConfig::default();
        assert!(config.remote_source().is_err());
        config.remote.kind = RemoteKind::Http;
        assert!(config.remote_source().is_err());
    }

    #[test]
    fn test_yaml_with_ftp_remote() {
        let config = PipelineConfig::from_yaml_str(
            r#"
remote:
  kind: ftp
  url: ftp://saiv.example.org/export
  username: saiv
  password: secret
"#,
        )
        .unwrap();

        assert_eq!(config.remote.kind, RemoteKind::Ftp);
        let source = config.remote_source().unwrap();
        assert_eq!(source.describe(), "ftp://saiv.example.org:21/export");
    }

    #[test]
    fn test_ftp_remote_rejects_other_schemes() {
        let mut config = PipelineConfig::default();
        config.remote.url = Some("https://saiv.example.org/export".to_string());
        assert!(config.remote_source().is_err());
    }
}
