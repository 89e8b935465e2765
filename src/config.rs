//! Configuration loading
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. User config (`~/.config/xtmreport/config.{toml,json}` or the platform equivalent)
//! 3. `xtmreport.toml`, `xtmreport.json` or legacy `xtm_config.json` in the working directory
//! 4. Files passed explicitly (`--config`)
//! 5. `XTMREPORT_*` environment variables (`XTMREPORT_RETRY__MAX_ATTEMPTS=6`)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Json, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::services::exclusion::ExclusionFilter;
use crate::services::normalizer::LocaleTable;
use crate::services::retry::RetryPolicy;
use crate::types::{Result, XtmError};

/// Application name for directory lookup and config file names
const APP_NAME: &str = "xtmreport";

const ENV_PREFIX: &str = "XTMREPORT_";

/// Working-directory config files, in merge order
const LOCAL_CONFIG_FILES: &[&str] = &["xtm_config.json", "xtmreport.json", "xtmreport.toml"];

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// XTM REST root, e.g. `https://xtm.example.com/project-manager-api-rest`
    pub base_url: String,
    pub auth_type: String,
    pub auth_token: String,
    pub email_recipients: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Legacy name for `output_dir`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onedrive_path: Option<PathBuf>,
    /// Identities left out of every aggregate (case-insensitive). Empty by
    /// default; deployments list their admin and test accounts here, see
    /// `xtmreport.example.toml`.
    pub excluded_users: Vec<String>,
    /// Locale code → display name, merged over the built-in table
    pub locales: BTreeMap<String, String>,
    pub retry: RetryConfig,
    /// Whole-pipeline attempts after a non-systemic failure
    pub max_runs: u32,
    pub min_free_disk_mb: u64,
    pub notify: NotifyConfig,
    pub log_level: LogLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_type: "XTM-Basic".to_string(),
            auth_token: String::new(),
            email_recipients: Vec::new(),
            output_dir: None,
            onedrive_path: None,
            excluded_users: Vec::new(),
            locales: BTreeMap::new(),
            retry: RetryConfig::default(),
            max_runs: 2,
            min_free_disk_mb: 50,
            notify: NotifyConfig::default(),
            log_level: LogLevel::default(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Where reports are written: `output_dir`, else `onedrive_path`, else
    /// a `reports` folder in the user data directory.
    pub fn report_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(|| self.onedrive_path.clone())
            .or_else(|| user_data_dir().map(|dir| dir.join("reports")))
            .unwrap_or_else(|| PathBuf::from("reports"))
    }

    pub fn exclusion_filter(&self) -> ExclusionFilter {
        ExclusionFilter::new(&self.excluded_users)
    }

    pub fn locale_table(&self) -> LocaleTable {
        LocaleTable::with_overrides(self.locales.clone())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub attempt_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            attempt_timeout_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotifyConfig {
    /// Prepare an e-mail with the report attached
    pub mail: bool,
    /// Desktop notification on completion or failure
    pub system: bool,
    /// Send the e-mail instead of leaving a draft open
    pub auto_send: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            mail: true,
            system: true,
            auto_send: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Builder for loading configuration from multiple sources.
#[derive(Debug)]
pub struct ConfigLoader {
    include_user_config: bool,
    include_env: bool,
    search_dir: Option<PathBuf>,
    explicit_files: Vec<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            include_user_config: true,
            include_env: true,
            search_dir: None,
            explicit_files: Vec::new(),
        }
    }

    pub fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    pub fn with_env(mut self, include: bool) -> Self {
        self.include_env = include;
        self
    }

    /// Look for local config files in `dir` (not its parents).
    pub fn with_search_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.search_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Later files take precedence over earlier ones.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    pub fn load(self) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if self.include_user_config {
            if let Some(user_config) = find_user_config() {
                figment = merge_file(figment, &user_config);
            }
        }

        if let Some(dir) = &self.search_dir {
            for name in LOCAL_CONFIG_FILES {
                let path = dir.join(name);
                if path.is_file() {
                    figment = merge_file(figment, &path);
                }
            }
        }

        for file in &self.explicit_files {
            if !file.is_file() {
                return Err(XtmError::Config(format!(
                    "config file not found: {}",
                    file.display()
                )));
            }
            figment = merge_file(figment, file);
        }

        if self.include_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        let config: Config = figment
            .extract()
            .map_err(|e| XtmError::Config(e.to_string()))?;
        Ok(config)
    }
}

fn merge_file(figment: Figment, path: &Path) -> Figment {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => figment.merge(Toml::file_exact(path)),
    }
}

fn find_user_config() -> Option<PathBuf> {
    let dir = user_config_dir()?;
    ["toml", "json"]
        .iter()
        .map(|ext| dir.join(format!("config.{ext}")))
        .find(|path| path.is_file())
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// `~/.config/xtmreport/` on Linux, `~/Library/Application Support/xtmreport/` on macOS.
pub fn user_config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn user_data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}
