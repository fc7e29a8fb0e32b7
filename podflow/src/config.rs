//! Configuration loading.
//!
//! Values come from `config.yaml` in the podflow home directory and are then
//! overridden by `PODFLOW_*` environment variables.

use crate::errors::{PodflowError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://lium.io/api";

/// Default fan-out width for multi-pod commands.
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Effective configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key sent as `X-API-KEY`.
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    /// Private SSH key; the public key is read from `<path>.pub`.
    pub ssh_key_path: Option<PathBuf>,
    /// Template used when none is requested.
    pub default_template_id: Option<String>,
    /// Worker cap for `exec`.
    pub max_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            ssh_key_path: None,
            default_template_id: None,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl Config {
    /// Loads from the default location and applies environment overrides.
    pub fn load() -> Result<Self> {
        let path = config_file()?;
        let mut config = Self::from_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        if config.ssh_key_path.is_none() {
            config.ssh_key_path = home_dir()
                .map(|home| home.join(".ssh").join("id_ed25519"))
                .filter(|p| p.exists());
        }
        Ok(config)
    }

    /// Reads a YAML file; a missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text)
            .map_err(|e| PodflowError::Config(format!("{}: {e}", path.display())))
    }

    /// Applies `PODFLOW_API_KEY`, `PODFLOW_BASE_URL` and `PODFLOW_SSH_KEY`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = lookup("PODFLOW_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("PODFLOW_BASE_URL") {
            self.base_url = url;
        }
        if let Some(path) = lookup("PODFLOW_SSH_KEY") {
            self.ssh_key_path = Some(expand_home(&path));
        }
    }

    /// Reads the public keys that go into a rent request.
    pub fn ssh_public_keys(&self) -> Result<Vec<String>> {
        let Some(private) = &self.ssh_key_path else {
            return Ok(Vec::new());
        };
        let mut public = private.clone().into_os_string();
        public.push(".pub");
        let public = PathBuf::from(public);
        if !public.exists() {
            return Err(PodflowError::Config(format!(
                "SSH public key not found at {}",
                public.display()
            )));
        }
        let key = std::fs::read_to_string(&public)?;
        Ok(key
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// API key with everything but the last four characters hidden.
    #[must_use]
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key.as_deref().map(|key| {
            let chars: Vec<char> = key.chars().collect();
            if chars.len() <= 4 {
                return "****".to_string();
            }
            let visible: String = chars[chars.len() - 4..].iter().collect();
            format!("****{visible}")
        })
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// The podflow home directory: `$PODFLOW_HOME` or `~/.podflow`.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("PODFLOW_HOME") {
        return Ok(PathBuf::from(dir));
    }
    home_dir()
        .map(|home| home.join(".podflow"))
        .ok_or_else(|| PodflowError::Config("Cannot determine home directory".into()))
}

/// Path of `config.yaml`.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.yaml"))
}
