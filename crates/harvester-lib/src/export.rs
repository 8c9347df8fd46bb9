//! Export seam for analyzed runs
//!
//! Forwarding is best-effort: the analysis report stays authoritative
//! whether or not the sink accepts the rows.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ExportError;
use crate::models::EntityKind;

/// One raw series row as forwarded to a sink. `columns` holds the
/// store's field values in positional order, without the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub entity: String,
    pub kind: EntityKind,
    pub timestamp: i64,
    pub columns: Vec<String>,
}

/// Destination for raw series rows.
#[async_trait]
pub trait ExportSink: Send + Sync {
    /// Human-readable destination, recorded in the analysis report when
    /// forwarding succeeds.
    fn destination(&self) -> String;

    async fn send(&self, rows: &[ExportRow]) -> Result<(), ExportError>;
}

/// Sink that writes rows as JSON lines, replacing the file atomically
/// through a temp-file rename.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write_atomic(&self, payload: &[u8]) -> std::io::Result<()> {
        use std::io::Write;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(payload)?;
        file.sync_all()?;
        std::fs::rename(&temp_path, &self.path)
    }
}

#[async_trait]
impl ExportSink for JsonFileSink {
    fn destination(&self) -> String {
        self.path.display().to_string()
    }

    async fn send(&self, rows: &[ExportRow]) -> Result<(), ExportError> {
        let mut payload = Vec::new();
        for row in rows {
            let line = serde_json::to_vec(row).map_err(|e| ExportError {
                destination: self.destination(),
                reason: format!("serialization failed: {e}"),
            })?;
            payload.extend_from_slice(&line);
            payload.push(b'\n');
        }

        self.write_atomic(&payload).map_err(|e| ExportError {
            destination: self.destination(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rows() -> Vec<ExportRow> {
        vec![
            ExportRow {
                entity: "web-0".to_string(),
                kind: EntityKind::Pod,
                timestamp: 100,
                columns: vec!["web-0".to_string(), "10m".to_string()],
            },
            ExportRow {
                entity: "worker-1".to_string(),
                kind: EntityKind::Node,
                timestamp: 101,
                columns: vec!["worker-1".to_string(), "45%".to_string()],
            },
        ]
    }

    #[tokio::test]
    async fn test_json_file_sink_writes_one_line_per_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export").join("run-1.jsonl");
        let sink = JsonFileSink::new(&path);

        sink.send(&rows()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<ExportRow> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(parsed, rows());
        // No leftover temp file after the rename.
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_json_file_sink_replaces_previous_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run-1.jsonl");
        let sink = JsonFileSink::new(&path);

        sink.send(&rows()).await.unwrap();
        sink.send(&rows()[..1]).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_json_file_sink_failure_names_destination() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let path = blocker.join("run-1.jsonl");
        let sink = JsonFileSink::new(&path);
        let err = sink.send(&rows()).await.unwrap_err();
        assert_eq!(err.destination, path.display().to_string());
    }
}
