use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

fn default_command_timeout() -> u64 {
    300
}

fn default_list_timeout() -> u64 {
    30
}

fn default_keepalive_interval() -> u64 {
    60
}

fn default_aur() -> bool {
    true
}

fn default_mirror_count() -> u32 {
    20
}

fn default_keep_versions() -> u32 {
    3
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Deadline for a single package-manager invocation, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Deadline for catalog enumeration calls, in seconds.
    #[serde(default = "default_list_timeout")]
    pub list_timeout_secs: u64,
    /// Period between privilege keepalive refreshes, in seconds.
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,
    /// Include AUR results in searches when a helper is available.
    #[serde(default = "default_aur")]
    pub aur: bool,
    /// Default country filter for mirror updates.
    #[serde(default)]
    pub mirror_country: Option<String>,
    /// Default number of mirrors to keep.
    #[serde(default = "default_mirror_count")]
    pub mirror_count: u32,
    /// Package cache versions to keep when cleaning.
    #[serde(default = "default_keep_versions")]
    pub clean_keep_versions: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            command_timeout_secs: default_command_timeout(),
            list_timeout_secs: default_list_timeout(),
            keepalive_interval_secs: default_keepalive_interval(),
            aur: default_aur(),
            mirror_country: None,
            mirror_count: default_mirror_count(),
            clean_keep_versions: default_keep_versions(),
        }
    }
}

fn config_file_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("could not determine config directory")?;
    let cfg = base.join("pkb/config.toml");
    if let Some(parent) = cfg.parent() {
        fs::create_dir_all(parent).context("creating config directory")?;
    }
    Ok(cfg)
}

impl Config {
    /// Load the config from disk. If the config file does not exist,
    /// create a default config file and return the default.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let cfg_path = match path {
            Some(p) => p.to_path_buf(),
            None => config_file_path()?,
        };
        if !cfg_path.exists() {
            let default = Config::default();
            let toml = toml::to_string_pretty(&default).context("serializing default config")?;
            fs::write(&cfg_path, toml)
                .with_context(|| format!("writing default config to {}", cfg_path.display()))?;
            return Ok(default);
        }
        let s = fs::read_to_string(&cfg_path)
            .with_context(|| format!("reading config {}", cfg_path.display()))?;
        let c: Config = toml::from_str(&s).context("parsing config toml")?;
        Ok(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.command_timeout_secs, 300);
        assert_eq!(config.keepalive_interval_secs, 60);
        assert!(config.aur);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "aur = false\nmirror_country = \"Germany\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(!config.aur);
        assert_eq!(config.mirror_country.as_deref(), Some("Germany"));
        assert_eq!(config.mirror_count, 20);
        assert_eq!(config.clean_keep_versions, 3);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "command_timeout_secs = \"soon\"").unwrap();

        assert!(Config::load(Some(&path)).is_err());
    }
}
