//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `webthing.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;
use webthing_adapter_virtual::{LAMP_ID, LAMP_TITLE};
use webthing_domain::error::DefinitionError;
use webthing_domain::options::ThingOptions;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity of the lamp Thing and simulation pace.
    pub thing: ThingConfig,
    /// Engine options shared by every Thing.
    pub options: ThingOptions,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Lamp identity and simulation settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ThingConfig {
    pub id: String,
    pub title: String,
    /// Milliseconds between simulated sensor reports.
    pub report_interval_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `webthing.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("webthing.toml")?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("WEBTHING_TITLE") {
            self.thing.title = val;
        }
        if let Some(val) = var("WEBTHING_MAX_ACTIONS")
            && let Ok(max) = val.parse()
        {
            self.options.max_actions = max;
        }
        if let Some(val) = var("WEBTHING_MAX_EVENTS")
            && let Ok(max) = val.parse()
        {
            self.options.max_events = max;
        }
        if let Some(val) = var("WEBTHING_IGNORE_CASE")
            && let Ok(ignore_case) = val.parse()
        {
            self.options.ignore_case = ignore_case;
        }
        if let Some(val) = var("WEBTHING_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.thing.id.is_empty() {
            return Err(ConfigError::Validation("thing id must not be empty".to_string()));
        }
        if self.thing.report_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "report interval must be non-zero".to_string(),
            ));
        }
        self.options.validate()?;
        Ok(())
    }

    #[must_use]
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.thing.report_interval_ms)
    }
}

impl Default for ThingConfig {
    fn default() -> Self {
        Self {
            id: LAMP_ID.to_string(),
            title: LAMP_TITLE.to_string(),
            report_interval_ms: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "webthingd=info,webthing_app=info,webthing_adapter_virtual=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Engine options out of range.
    #[error("invalid thing options")]
    Options(#[from] DefinitionError),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.thing.id, LAMP_ID);
        assert_eq!(config.thing.title, LAMP_TITLE);
        assert_eq!(config.report_interval(), Duration::from_secs(1));
        assert_eq!(config.options, ThingOptions::default());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.thing.report_interval_ms, 1000);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [thing]
            id = 'urn:dev:ops:desk-lamp'
            title = 'Desk Lamp'
            report_interval_ms = 250

            [options]
            ignore_case = true
            max_actions = 10
            max_events = 20
            subscriber_queue = 8
            href_prefix = '/api'

            [logging]
            filter = 'debug'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.thing.id, "urn:dev:ops:desk-lamp");
        assert_eq!(config.thing.title, "Desk Lamp");
        assert_eq!(config.report_interval(), Duration::from_millis(250));
        assert!(config.options.ignore_case);
        assert_eq!(config.options.max_actions, 10);
        assert_eq!(config.options.max_events, 20);
        assert_eq!(config.options.subscriber_queue, 8);
        assert_eq!(config.options.href_prefix, "/api");
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [options]
            max_events = 5
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.options.max_events, 5);
        assert_eq!(config.options.max_actions, 100);
        assert_eq!(config.thing.id, LAMP_ID);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.thing.id, LAMP_ID);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_apply_env_overrides_when_set() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("WEBTHING_TITLE", "Hall Lamp"),
            ("WEBTHING_MAX_ACTIONS", "7"),
            ("WEBTHING_MAX_EVENTS", "9"),
            ("WEBTHING_IGNORE_CASE", "true"),
            ("WEBTHING_LOG", "trace"),
        ]));
        assert_eq!(config.thing.title, "Hall Lamp");
        assert_eq!(config.options.max_actions, 7);
        assert_eq!(config.options.max_events, 9);
        assert!(config.options.ignore_case);
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_prefer_rust_log_over_webthing_log() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[("WEBTHING_LOG", "trace"), ("RUST_LOG", "warn")]));
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn should_ignore_unparsable_env_values() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("WEBTHING_MAX_ACTIONS", "many"),
            ("WEBTHING_IGNORE_CASE", "sometimes"),
        ]));
        assert_eq!(config.options.max_actions, 100);
        assert!(!config.options.ignore_case);
    }

    #[test]
    fn should_reject_zero_report_interval() {
        let mut config = Config::default();
        config.thing.report_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_zero_option_bound() {
        let mut config = Config::default();
        config.options.max_events = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Options(_))));
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }
}
