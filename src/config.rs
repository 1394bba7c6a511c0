use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{DEFAULT_API_BASE, DEFAULT_TIMEOUT};
use crate::page::DEFAULT_FALLBACK_USER_ID;

const DEFAULT_ENV_PREFIX: &str = "STAFFROLL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_user_agent() -> String {
    format!("staffroll/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_fallback_user_id")]
    pub fallback_user_id: u64,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            fallback_user_id: default_fallback_user_id(),
        }
    }
}

fn default_fallback_user_id() -> u64 {
    DEFAULT_FALLBACK_USER_ID
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("staffroll").join("staffroll.log"))
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = apply_env(cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.api.base_url.trim().is_empty() {
        base.api.base_url = other.api.base_url;
    }
    if !other.api.user_agent.trim().is_empty() {
        base.api.user_agent = other.api.user_agent;
    }
    if !other.api.timeout.is_zero() {
        base.api.timeout = other.api.timeout;
    }

    if other.ui.fallback_user_id != 0 {
        base.ui.fallback_user_id = other.ui.fallback_user_id;
    }

    if !other.log.level.trim().is_empty() {
        base.log.level = other.log.level;
    }
    if other.log.file.is_some() {
        base.log.file = other.log.file;
    }

    base
}

fn apply_env(mut cfg: Config, prefix: &str) -> Config {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    cfg
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => match humantime::parse_duration(&value) {
            Ok(duration) => cfg.api.timeout = duration,
            Err(err) => tracing::warn!(%value, error = %err, "ignoring invalid api.timeout"),
        },
        "ui.fallback_user_id" => {
            if let Ok(parsed) = value.parse::<u64>() {
                if parsed != 0 {
                    cfg.ui.fallback_user_id = parsed;
                }
            }
        }
        "log.level" => cfg.log.level = value,
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        _ => {}
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("staffroll").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn isolated() -> LoadOptions {
        LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/staffroll.yaml")),
            env_prefix: Some("STAFFROLL_TEST_NONE".into()),
        }
    }

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(isolated()).unwrap();
        assert_eq!(cfg.api.base_url, DEFAULT_API_BASE);
        assert_eq!(cfg.api.timeout, Duration::from_secs(20));
        assert_eq!(cfg.ui.fallback_user_id, 1);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn reads_yaml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "api:\n  base_url: http://127.0.0.1:9000\n  timeout: 3s\nui:\n  fallback_user_id: 4\n",
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("STAFFROLL_TEST_NONE".into()),
        })
        .unwrap();
        assert_eq!(cfg.api.base_url, "http://127.0.0.1:9000");
        assert_eq!(cfg.api.timeout, Duration::from_secs(3));
        assert_eq!(cfg.ui.fallback_user_id, 4);
        assert_eq!(cfg.api.user_agent, default_user_agent());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "api: [not, a, map]\n").unwrap();
        assert!(load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("STAFFROLL_TEST_NONE".into()),
        })
        .is_err());
    }

    #[test]
    fn env_overrides() {
        env::set_var("STAFFROLL_ENVTEST_API__BASE_URL", "http://localhost:1234");
        env::set_var("STAFFROLL_ENVTEST_UI__FALLBACK_USER_ID", "6");
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/staffroll.yaml")),
            env_prefix: Some("STAFFROLL_ENVTEST".into()),
        })
        .unwrap();
        assert_eq!(cfg.api.base_url, "http://localhost:1234");
        assert_eq!(cfg.ui.fallback_user_id, 6);
        env::remove_var("STAFFROLL_ENVTEST_API__BASE_URL");
        env::remove_var("STAFFROLL_ENVTEST_UI__FALLBACK_USER_ID");
    }
}
