//! Eventlog Pipeline - durable, ordered delivery of audit events to a sink
//!
//! This crate owns everything with side effects:
//! - The sink contract (`SinkWriter` / `SinkFactory`) and the built-in
//!   JSON-lines, debug-file and in-memory sinks
//! - The write pipeline: availability gating, backpressure, in-flight
//!   tracking, hot reconfiguration and graceful stop
//! - The shutdown coordinator binding process signals to `stop`
//! - Pipeline configuration (TOML)
//!
//! # Usage
//!
//! ```no_run
//! use eventlog_core::{Action, Event};
//! use eventlog_pipeline::{Pipeline, PipelineConfig};
//! use serde_json::json;
//!
//! # async fn run() -> eventlog_core::Result<()> {
//! let pipeline = Pipeline::new();
//! pipeline
//!     .init(PipelineConfig::new("file:///var/log/audit", "events"))
//!     .await?;
//! pipeline
//!     .log(Event::new(json!({"_id": 1}), "Order", Action::Created))
//!     .await?;
//! pipeline.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod hooks;
pub mod pipeline;
pub(crate) mod registry;
pub mod shutdown;
pub mod sink;

pub use config::PipelineConfig;
pub use hooks::{ErrorHook, TracingErrorHook};
pub use pipeline::{LogTicket, Pipeline, PipelineBuilder, PipelineState};
pub use shutdown::{ExitProcess, ShutdownAction, ShutdownSignal};
pub use sink::{AdapterRegistry, MemorySink, SinkFactory, SinkSpec, SinkTarget, SinkWriter};
