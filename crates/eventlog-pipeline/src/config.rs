//! Pipeline configuration
//!
//! A `PipelineConfig` names the sink target and collection plus the
//! shutdown and debug switches. It is plain data: `Pipeline::init` and
//! `Pipeline::reconfigure` validate it and resolve it into a `SinkSpec`.
//!
//! ```toml
//! sink_target = "file:///var/log/audit"
//! collection = "event-log"
//! shutdown_on_signal = true
//! ```

use eventlog_core::errors::{EventLogError, Result};
use eventlog_core_types::Sensitive;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default number of buffered writes before a sink signals backpressure
pub const DEFAULT_HIGH_WATER_MARK: usize = 16;

/// Default path of the debug file sink
pub const DEFAULT_DEBUG_FILE: &str = "logged.json";

/// Configuration of one write pipeline
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Sink URL, e.g. `file:///var/log/audit` or `mongodb://user:pw@host/db`
    pub sink_target: Sensitive<String>,
    /// Collection (file stem or table name) events are written to
    pub collection: String,
    /// Register SIGTERM/SIGINT listeners when the sink is opened
    #[serde(default = "default_true")]
    pub attach_signal_listeners: bool,
    /// Terminate the process once a signal-triggered stop settles
    #[serde(default)]
    pub shutdown_on_signal: bool,
    /// Write pretty JSON to a local file instead of the sink target
    #[serde(default)]
    pub debug_file_output: bool,
    /// File used when `debug_file_output` is set
    #[serde(default = "default_debug_file")]
    pub debug_file_path: PathBuf,
    /// Buffered writes at which the sink reports backpressure
    #[serde(default = "default_high_water_mark")]
    pub high_water_mark: usize,
}

fn default_true() -> bool {
    true
}

fn default_debug_file() -> PathBuf {
    PathBuf::from(DEFAULT_DEBUG_FILE)
}

fn default_high_water_mark() -> usize {
    DEFAULT_HIGH_WATER_MARK
}

impl PipelineConfig {
    /// Create a configuration with default switches
    pub fn new(sink_target: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            sink_target: Sensitive::new(sink_target.into()),
            collection: collection.into(),
            attach_signal_listeners: true,
            shutdown_on_signal: false,
            debug_file_output: false,
            debug_file_path: default_debug_file(),
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }

    /// Enable or disable signal listener registration
    #[must_use]
    pub fn with_signal_listeners(mut self, attach: bool) -> Self {
        self.attach_signal_listeners = attach;
        self
    }

    /// Terminate the process after a signal-triggered stop
    #[must_use]
    pub fn with_shutdown_on_signal(mut self, shutdown: bool) -> Self {
        self.shutdown_on_signal = shutdown;
        self
    }

    /// Route events to a pretty-printed local file
    #[must_use]
    pub fn with_debug_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_file_output = true;
        self.debug_file_path = path.into();
        self
    }

    /// Set the backpressure threshold
    #[must_use]
    pub fn with_high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = high_water_mark;
        self
    }

    /// Parse a configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for malformed TOML, unknown keys or a
    /// document that fails `validate`.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(text).map_err(|e| EventLogError::InvalidConfiguration {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `MissingConfiguration` when the file does not exist, `Io` when
    /// it cannot be read and the `from_toml_str` errors otherwise.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EventLogError::MissingConfiguration,
            _ => EventLogError::io("read_config", e),
        })?;
        Self::from_toml_str(&text)
    }

    /// Check the configuration without touching any sink
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(EventLogError::InvalidConfiguration {
                reason: reason.to_string(),
            })
        };

        if self.collection.trim().is_empty() {
            return invalid("collection must not be empty");
        }
        if self.collection.contains(['/', '\\']) {
            return invalid("collection must not contain path separators");
        }
        if self.high_water_mark == 0 {
            return invalid("high_water_mark must be at least 1");
        }
        if self.debug_file_output {
            if self.debug_file_path.as_os_str().is_empty() {
                return invalid("debug_file_path must not be empty");
            }
            return Ok(());
        }
        if self.scheme().is_none() {
            return invalid("sink_target must be a URL of the form <scheme>://<location>");
        }
        Ok(())
    }

    /// The URL scheme of the sink target, lowercased
    pub fn scheme(&self) -> Option<String> {
        let (scheme, _) = self.sink_target.expose().split_once("://")?;
        let valid = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        valid.then(|| scheme.to_ascii_lowercase())
    }

    /// The sink target with any userinfo replaced by `***`
    pub fn redacted_target(&self) -> String {
        redact_userinfo(self.sink_target.expose())
    }
}

/// Replace the userinfo part of a URL (`user:password@`) with `***`
pub(crate) fn redact_userinfo(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}://***@{}", scheme, &rest[at + 1..]),
        None => url.to_string(),
    }
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("sink_target", &self.redacted_target())
            .field("collection", &self.collection)
            .field("attach_signal_listeners", &self.attach_signal_listeners)
            .field("shutdown_on_signal", &self.shutdown_on_signal)
            .field("debug_file_output", &self.debug_file_output)
            .field("debug_file_path", &self.debug_file_path)
            .field("high_water_mark", &self.high_water_mark)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
            sink_target = "file:///var/log/audit"
            collection = "event-log"
            "#,
        )
        .unwrap();

        assert!(config.attach_signal_listeners);
        assert!(!config.shutdown_on_signal);
        assert!(!config.debug_file_output);
        assert_eq!(config.debug_file_path, PathBuf::from("logged.json"));
        assert_eq!(config.high_water_mark, DEFAULT_HIGH_WATER_MARK);
        assert_eq!(config.scheme().as_deref(), Some("file"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = PipelineConfig::from_toml_str(
            r#"
            sink_target = "file:///tmp"
            collection = "c"
            sink_targte = "typo"
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, EventLogError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_validation_rules() {
        let base = PipelineConfig::new("file:///tmp/audit", "events");
        assert!(base.validate().is_ok());

        let cases = [
            PipelineConfig::new("file:///tmp/audit", ""),
            PipelineConfig::new("file:///tmp/audit", "a/b"),
            PipelineConfig::new("not a url", "events"),
            PipelineConfig::new("://nowhere", "events"),
            base.clone().with_high_water_mark(0),
        ];
        for config in cases {
            assert!(
                matches!(
                    config.validate(),
                    Err(EventLogError::InvalidConfiguration { .. })
                ),
                "Expected {:?} to be rejected",
                config
            );
        }
    }

    #[test]
    fn test_debug_output_does_not_need_a_url() {
        let config = PipelineConfig::new("", "events").with_debug_file("/tmp/logged.json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_credentials_are_redacted() {
        let config = PipelineConfig::new("mongodb://audit:hunter2@db:27017/logs", "events");

        assert_eq!(config.redacted_target(), "mongodb://***@db:27017/logs");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("db:27017"));
    }

    #[test]
    fn test_redaction_leaves_plain_urls_alone() {
        assert_eq!(redact_userinfo("file:///var/log"), "file:///var/log");
        assert_eq!(redact_userinfo("mem://a/b@c"), "mem://a/b@c");
        assert_eq!(redact_userinfo("no-scheme"), "no-scheme");
    }
}
