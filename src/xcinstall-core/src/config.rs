use crate::patcher::PatchMode;
use crate::paths::AppDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    /// Language whose `.xclangspec` and `.ideplugin` are installed.
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub patch: PatchConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            language: default_language(),
            host: HostConfig::default(),
            patch: PatchConfig::default(),
            notifications: NotificationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_app_bundle")]
    pub app_bundle: PathBuf,
    #[serde(default = "default_identifier_key")]
    pub identifier_key: String,
    /// Skips querying Xcode and uses this identifier instead.
    #[serde(default)]
    pub compatibility_identifier: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            app_bundle: default_app_bundle(),
            identifier_key: default_identifier_key(),
            compatibility_identifier: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchConfig {
    #[serde(default)]
    pub mode: PatchMode,
    #[serde(default)]
    pub backup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_dialog_enabled")]
    pub dialog: bool,
    #[serde(default)]
    pub speak: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            dialog: default_dialog_enabled(),
            speak: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
    #[serde(default)]
    pub stdout: bool,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_log_files: default_max_log_files(),
            stdout: false,
            file_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
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
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config validation failed: {0}")]
    Validation(ValidationError),
    #[error("failed to prepare configuration directories: {0}")]
    Directories(#[from] crate::paths::DirsError),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unsupported config_version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("language must not be empty")]
    EmptyLanguage,
    #[error("language {0:?} must be a plain file name")]
    InvalidLanguage(String),
    #[error("host.identifier_key must not be empty")]
    EmptyIdentifierKey,
}

impl Config {
    pub fn load_or_default(dirs: &AppDirs) -> Result<Self, ConfigError> {
        dirs.ensure_exists()?;
        let path = Self::config_path(dirs);
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(&contents, &path)
    }

    pub fn from_toml(contents: &str, path: &std::path::Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    pub fn config_path(dirs: &AppDirs) -> PathBuf {
        dirs.config_dir().join("config.toml")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.config_version != CURRENT_CONFIG_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                found: self.config_version,
                expected: CURRENT_CONFIG_VERSION,
            });
        }
        let language = self.language.trim();
        if language.is_empty() {
            return Err(ValidationError::EmptyLanguage);
        }
        if language.contains(['/', '\\']) || language == "." || language == ".." {
            return Err(ValidationError::InvalidLanguage(self.language.clone()));
        }
        if self.host.identifier_key.trim().is_empty() {
            return Err(ValidationError::EmptyIdentifierKey);
        }
        Ok(())
    }
}

fn default_config_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

fn default_language() -> String {
    "Go".into()
}

fn default_app_bundle() -> PathBuf {
    PathBuf::from("/Applications/Xcode.app")
}

fn default_identifier_key() -> String {
    "DVTPlugInCompatibilityUUID".into()
}

fn default_dialog_enabled() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_max_log_files() -> usize {
    7
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.language, "Go");
        assert_eq!(config.patch.mode, PatchMode::Exact);
        assert!(!config.patch.backup);
        assert!(config.notifications.dialog);
        assert_eq!(config.logging.max_log_files, 7);
        assert!(!config.logging.stdout);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn invalid_version_rejected() {
        let mut config = Config::default();
        config.config_version = CURRENT_CONFIG_VERSION + 1;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ValidationError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn path_like_language_rejected() {
        let mut config = Config::default();
        config.language = "../Go".into();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidLanguage(_))
        ));

        config.language = "  ".into();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::EmptyLanguage)
        ));
    }

    #[test]
    fn parses_partial_toml() {
        let config = Config::from_toml(
            r#"
language = "Swiftish"

[host]
compatibility_identifier = "ABC-123"

[patch]
mode = "scoped"
backup = true
"#,
            Path::new("config.toml"),
        )
        .expect("config should parse");

        assert_eq!(config.language, "Swiftish");
        assert_eq!(
            config.host.compatibility_identifier.as_deref(),
            Some("ABC-123")
        );
        assert_eq!(config.host.identifier_key, "DVTPlugInCompatibilityUUID");
        assert_eq!(config.patch.mode, PatchMode::Scoped);
        assert!(config.patch.backup);
    }

    #[test]
    fn unknown_patch_mode_is_a_parse_error() {
        let err = Config::from_toml("[patch]\nmode = \"fuzzy\"\n", Path::new("config.toml"))
            .expect_err("mode should be rejected");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
