use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::ParentScanError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub parentscan: String,
    pub http: String,
}

impl LoggingConfig {
    const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    const PARENTSCAN_LEVEL: &str = "info";
    const HTTP_LEVEL: &str = "warn";

    fn default() -> Self {
        LoggingConfig {
            parentscan: Self::PARENTSCAN_LEVEL.to_string(),
            http: Self::HTTP_LEVEL.to_string(),
        }
    }

    /// Builds the flexi_logger spec string. The HTTP level applies to the
    /// client stack so request chatter stays quiet unless asked for.
    pub fn log_spec(&self) -> String {
        format!(
            "{}, parentscan={}, reqwest={}, hyper={}, hyper_util={}",
            Self::HTTP_LEVEL,
            self.parentscan,
            self.http,
            self.http,
            self.http
        )
    }

    fn ensure_valid(&mut self) {
        self.parentscan = Self::valid_level("parentscan", &self.parentscan, Self::PARENTSCAN_LEVEL);
        self.http = Self::valid_level("http", &self.http, Self::HTTP_LEVEL);
    }

    fn valid_level(label: &str, value: &str, default: &str) -> String {
        let level = value.trim().to_ascii_lowercase();
        if Self::LOG_LEVELS.contains(&level.as_str()) {
            level
        } else {
            eprintln!(
                "Config error: {} log level of '{}' is invalid - using default of '{}'",
                label, value, default
            );
            default.to_owned()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IndexConfig {
    pub base_url: String,
    pub delay_ms: u64,
    pub timeout_secs: u64,
}

impl IndexConfig {
    const BASE_URL: &str = "http://0.0.0.0";
    const DELAY_MS: u64 = 50;
    const TIMEOUT_SECS: u64 = 30;

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn default() -> Self {
        IndexConfig {
            base_url: Self::BASE_URL.to_owned(),
            delay_ms: Self::DELAY_MS,
            timeout_secs: Self::TIMEOUT_SECS,
        }
    }

    fn ensure_valid(&mut self) {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            eprintln!(
                "Config error: index base_url is empty - using default of '{}'",
                Self::BASE_URL
            );
            self.base_url = Self::BASE_URL.to_owned();
        } else {
            self.base_url = trimmed.to_owned();
        }

        if self.timeout_secs == 0 {
            eprintln!(
                "Config error: index timeout_secs must be positive - using default of {}",
                Self::TIMEOUT_SECS
            );
            self.timeout_secs = Self::TIMEOUT_SECS;
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    pub sample_size: usize,
}

impl DetectionConfig {
    const SAMPLE_SIZE: usize = 3;

    fn default() -> Self {
        DetectionConfig {
            sample_size: Self::SAMPLE_SIZE,
        }
    }

    fn ensure_valid(&mut self) {
        if self.sample_size == 0 {
            eprintln!(
                "Config error: detection sample_size must be at least 1 - using default of {}",
                Self::SAMPLE_SIZE
            );
            self.sample_size = Self::SAMPLE_SIZE;
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PathsConfig {
    pub legacy_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl PathsConfig {
    fn default() -> Self {
        PathsConfig {
            legacy_dir: PathBuf::from("legacy"),
            output_dir: PathBuf::from("."),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub logging: LoggingConfig,
    pub index: IndexConfig,
    pub detection: DetectionConfig,
    pub paths: PathsConfig,
}

impl Config {
    const ENV_PREFIX: &str = "PARENTSCAN_";

    pub fn default() -> Self {
        Config {
            logging: LoggingConfig::default(),
            index: IndexConfig::default(),
            detection: DetectionConfig::default(),
            paths: PathsConfig::default(),
        }
    }

    /// Loads the configuration from `config.toml` in the app's data directory.
    /// Writes the default config to disk if no file exists there yet.
    pub fn load_config(project_dirs: &ProjectDirs) -> Result<Self, ParentScanError> {
        let config_path = project_dirs.data_local_dir().join("config.toml");

        if !config_path.exists() {
            Self::write_default(&config_path);
        }

        Self::load_from(&config_path)
    }

    /// Loads defaults merged with the given TOML file (if it exists) and
    /// `PARENTSCAN_` environment variables. Nested keys use `__`, for
    /// example `PARENTSCAN_INDEX__BASE_URL`.
    pub fn load_from(config_path: &Path) -> Result<Self, ParentScanError> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed(Self::ENV_PREFIX).split("__"));

        let mut config: Config = figment.extract().map_err(|err| {
            ParentScanError::Config(format!(
                "could not load config file {}: {}",
                config_path.display(),
                err
            ))
        })?;

        config.ensure_valid();

        Ok(config)
    }

    fn write_default(config_path: &Path) {
        if let Some(parent) = config_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!(
                    "Failed to create configuration directory {}: {}",
                    parent.display(),
                    e
                );
                return;
            }
        }
        match toml::to_string_pretty(&Config::default()) {
            Ok(toml_string) => {
                if let Err(e) = fs::write(config_path, toml_string) {
                    eprintln!(
                        "Failed to write default config to {}: {}",
                        config_path.display(),
                        e
                    );
                }
            }
            Err(_) => eprintln!("Failed to serialize default config."),
        }
    }

    pub fn ensure_valid(&mut self) {
        self.logging.ensure_valid();
        self.index.ensure_valid();
        self.detection.ensure_valid();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_when_file_missing() {
        Jail::expect_with(|jail| {
            let config = Config::load_from(&jail.directory().join("missing.toml")).unwrap();
            assert_eq!(config, Config::default());
            assert_eq!(config.index.delay(), Duration::from_millis(50));
            assert_eq!(config.detection.sample_size, 3);
            Ok(())
        });
    }

    #[test]
    fn test_file_and_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [index]
                base_url = "http://localhost:8080/"
                delay_ms = 10

                [detection]
                sample_size = 5
                "#,
            )?;
            jail.set_env("PARENTSCAN_INDEX__DELAY_MS", "0");
            jail.set_env("PARENTSCAN_PATHS__OUTPUT_DIR", "out");

            let config = Config::load_from(&jail.directory().join("config.toml")).unwrap();
            assert_eq!(config.index.base_url, "http://localhost:8080");
            assert_eq!(config.index.delay_ms, 0);
            assert_eq!(config.detection.sample_size, 5);
            assert_eq!(config.paths.output_dir, PathBuf::from("out"));
            assert_eq!(config.paths.legacy_dir, PathBuf::from("legacy"));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [logging]
                parentscan = " DEBUG "
                http = "chatty"

                [detection]
                sample_size = 0
                "#,
            )?;

            let config = Config::load_from(&jail.directory().join("config.toml")).unwrap();
            assert_eq!(config.logging.parentscan, "debug");
            assert_eq!(config.logging.http, "warn");
            assert_eq!(config.detection.sample_size, 3);
            Ok(())
        });
    }

    #[test]
    fn test_malformed_file_is_a_config_error() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[index]\ndelay_ms = \"soon\"\n")?;
            let result = Config::load_from(&jail.directory().join("config.toml"));
            assert!(matches!(result, Err(ParentScanError::Config(_))));
            Ok(())
        });
    }

    #[test]
    fn test_log_spec_includes_http_stack() {
        let spec = LoggingConfig::default().log_spec();
        assert!(spec.contains("parentscan=info"));
        assert!(spec.contains("reqwest=warn"));
    }
}
