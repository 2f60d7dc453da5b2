//! Sink adapter contract
//!
//! A sink is anything that can durably accept `EventRecord`s one at a time
//! and flush on finish. Implementations provide a `SinkWriter`; the pipeline
//! wraps each writer in a task-owned handle that adds buffering,
//! backpressure and acknowledgement semantics.
//!
//! Targets are resolved from `PipelineConfig`:
//! - `debug_file_output` set: pretty JSON to `debug_file_path`
//! - `file://<dir>`: JSON lines to `<dir>/<collection>.jsonl`
//! - any other scheme: the `SinkFactory` registered for that scheme

pub mod file;
pub mod memory;
pub(crate) mod task;

use crate::config::{redact_userinfo, PipelineConfig};
use async_trait::async_trait;
use eventlog_core::errors::{EventLogError, Result};
use eventlog_core::event::EventRecord;
use eventlog_core_types::Sensitive;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub use file::{DebugFileSink, JsonLinesSink};
pub use memory::MemorySink;

/// Destination for event records
///
/// Writes are issued one at a time, in submission order. A failed write
/// fails that record only; the writer keeps receiving later records.
#[async_trait]
pub trait SinkWriter: Send + 'static {
    /// Durably accept one record
    async fn write(&mut self, record: &EventRecord) -> Result<()>;

    /// Flush and release the destination; called once, after the last write
    async fn finish(&mut self) -> Result<()>;
}

/// Opens writers for one URL scheme
#[async_trait]
pub trait SinkFactory: Send + Sync + 'static {
    async fn open(&self, target: &SinkTarget) -> Result<Box<dyn SinkWriter>>;
}

/// Resolved sink target handed to a `SinkFactory`
#[derive(Clone)]
pub struct SinkTarget {
    url: Sensitive<String>,
    scheme: String,
    collection: String,
}

impl SinkTarget {
    /// Full target URL, credentials included
    pub fn url(&self) -> &Sensitive<String> {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Target URL safe for logs
    pub fn redacted(&self) -> String {
        redact_userinfo(self.url.expose())
    }
}

impl fmt::Debug for SinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkTarget")
            .field("url", &self.redacted())
            .field("collection", &self.collection)
            .finish()
    }
}

/// Scheme → factory map consulted when resolving non-file targets
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: HashMap<String, Arc<dyn SinkFactory>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for `scheme`, replacing any previous registration
    pub fn register(&mut self, scheme: impl Into<String>, factory: Arc<dyn SinkFactory>) {
        self.factories
            .insert(scheme.into().to_ascii_lowercase(), factory);
    }

    pub fn get(&self, scheme: &str) -> Option<Arc<dyn SinkFactory>> {
        self.factories.get(scheme).cloned()
    }

    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

/// Concrete sink a configuration resolves to
#[derive(Clone)]
pub enum SinkSpec {
    /// One compact JSON document per line, appended
    JsonLines { path: PathBuf },
    /// Pretty JSON per record, file truncated at open
    DebugFile { path: PathBuf },
    /// Sink opened by a registered adapter
    Adapter {
        factory: Arc<dyn SinkFactory>,
        target: SinkTarget,
    },
}

impl SinkSpec {
    /// Resolve a configuration against the registered adapters
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a target without a scheme or a
    /// `file://` target without a directory, and `UnknownSinkScheme` when no
    /// adapter is registered for the scheme.
    pub fn resolve(config: &PipelineConfig, adapters: &AdapterRegistry) -> Result<Self> {
        if config.debug_file_output {
            return Ok(SinkSpec::DebugFile {
                path: config.debug_file_path.clone(),
            });
        }

        let scheme = config
            .scheme()
            .ok_or_else(|| EventLogError::InvalidConfiguration {
                reason: "sink_target has no scheme".to_string(),
            })?;

        if scheme == "file" {
            let url = config.sink_target.expose();
            let dir = url
                .split_once("://")
                .map(|(_, rest)| rest)
                .filter(|rest| !rest.is_empty())
                .ok_or_else(|| EventLogError::InvalidConfiguration {
                    reason: "file:// target must name a directory".to_string(),
                })?;
            let path = PathBuf::from(dir).join(format!("{}.jsonl", config.collection));
            return Ok(SinkSpec::JsonLines { path });
        }

        let factory = adapters
            .get(&scheme)
            .ok_or_else(|| EventLogError::UnknownSinkScheme {
                scheme: scheme.clone(),
            })?;
        Ok(SinkSpec::Adapter {
            factory,
            target: SinkTarget {
                url: config.sink_target.clone(),
                scheme,
                collection: config.collection.clone(),
            },
        })
    }

    /// Human-readable sink name used in logs and errors
    pub fn describe(&self) -> String {
        match self {
            SinkSpec::JsonLines { path } => format!("jsonl:{}", path.display()),
            SinkSpec::DebugFile { path } => format!("debug:{}", path.display()),
            SinkSpec::Adapter { target, .. } => target.redacted(),
        }
    }

    /// Open a fresh writer for this sink
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying open (I/O or adapter specific).
    pub async fn open(&self) -> Result<Box<dyn SinkWriter>> {
        match self {
            SinkSpec::JsonLines { path } => Ok(Box::new(JsonLinesSink::open(path).await?)),
            SinkSpec::DebugFile { path } => Ok(Box::new(DebugFileSink::open(path).await?)),
            SinkSpec::Adapter { factory, target } => factory.open(target).await,
        }
    }
}

impl fmt::Debug for SinkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_file_target_resolves_to_collection_file() {
        let config = PipelineConfig::new("file:///var/log/audit", "event-log");

        let spec = SinkSpec::resolve(&config, &AdapterRegistry::new()).unwrap();

        match spec {
            SinkSpec::JsonLines { path } => {
                assert_eq!(path, Path::new("/var/log/audit/event-log.jsonl"));
            }
            other => panic!("Expected JSON lines sink, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_flag_wins_over_target() {
        let config =
            PipelineConfig::new("kafka://broker/topic", "events").with_debug_file("out.json");

        let spec = SinkSpec::resolve(&config, &AdapterRegistry::new()).unwrap();

        assert_eq!(spec.describe(), "debug:out.json");
    }

    #[test]
    fn test_unregistered_scheme_is_rejected() {
        let config = PipelineConfig::new("kafka://broker/topic", "events");

        let err = SinkSpec::resolve(&config, &AdapterRegistry::new()).unwrap_err();

        assert_eq!(
            err,
            EventLogError::UnknownSinkScheme {
                scheme: "kafka".to_string()
            }
        );
    }

    #[test]
    fn test_registered_scheme_resolves_case_insensitively() {
        let mut adapters = AdapterRegistry::new();
        adapters.register("Memory", Arc::new(MemorySink::new()));
        let config = PipelineConfig::new("MEMORY://user:pw@local/audit", "events");

        let spec = SinkSpec::resolve(&config, &adapters).unwrap();

        match &spec {
            SinkSpec::Adapter { target, .. } => {
                assert_eq!(target.scheme(), "memory");
                assert_eq!(target.collection(), "events");
                assert_eq!(target.url().expose(), "MEMORY://user:pw@local/audit");
            }
            other => panic!("Expected adapter sink, got {:?}", other),
        }
        assert!(!spec.describe().contains("pw"));
    }

    #[test]
    fn test_file_target_without_directory_is_invalid() {
        let config = PipelineConfig::new("file://", "events");

        let err = SinkSpec::resolve(&config, &AdapterRegistry::new()).unwrap_err();

        assert!(matches!(err, EventLogError::InvalidConfiguration { .. }));
    }
}
