//! File-backed sinks
//!
//! `JsonLinesSink` appends one compact JSON document per line and is the
//! sink behind `file://` targets. `DebugFileSink` writes pretty JSON for
//! inspection during development; it starts from an empty file every time
//! it is opened.

use super::SinkWriter;
use async_trait::async_trait;
use eventlog_core::errors::{EventLogError, Result};
use eventlog_core::event::EventRecord;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

async fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .await
            .map_err(|e| EventLogError::io("create_sink_dir", e)),
        _ => Ok(()),
    }
}

async fn finish_file(file: &mut File) -> Result<()> {
    file.flush()
        .await
        .map_err(|e| EventLogError::io("flush_sink", e))?;
    file.sync_all()
        .await
        .map_err(|e| EventLogError::io("sync_sink", e))
}

/// Appends records to `<dir>/<collection>.jsonl`
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: File,
}

impl JsonLinesSink {
    /// Open (creating if needed) the file for appending
    ///
    /// # Errors
    ///
    /// Returns `Io` when the directory or file cannot be created.
    pub async fn open(path: &Path) -> Result<Self> {
        create_parent(path).await?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| EventLogError::io("open_sink", e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SinkWriter for JsonLinesSink {
    async fn write(&mut self, record: &EventRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .await
            .map_err(|e| EventLogError::io("write_sink", e))?;
        self.file
            .flush()
            .await
            .map_err(|e| EventLogError::io("flush_sink", e))
    }

    async fn finish(&mut self) -> Result<()> {
        finish_file(&mut self.file).await
    }
}

/// Pretty-printed records in a single local file
#[derive(Debug)]
pub struct DebugFileSink {
    path: PathBuf,
    file: File,
}

impl DebugFileSink {
    /// Open the file, discarding whatever a previous run left in it
    ///
    /// # Errors
    ///
    /// Returns `Io` when the directory or file cannot be created.
    pub async fn open(path: &Path) -> Result<Self> {
        create_parent(path).await?;
        let file = File::create(path)
            .await
            .map_err(|e| EventLogError::io("open_sink", e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SinkWriter for DebugFileSink {
    async fn write(&mut self, record: &EventRecord) -> Result<()> {
        // One-space indentation keeps large payloads readable in a pager
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        record.serialize(&mut serializer)?;
        out.push(b'\n');
        self.file
            .write_all(&out)
            .await
            .map_err(|e| EventLogError::io("write_sink", e))?;
        self.file
            .flush()
            .await
            .map_err(|e| EventLogError::io("flush_sink", e))
    }

    async fn finish(&mut self) -> Result<()> {
        finish_file(&mut self.file).await
    }
}
