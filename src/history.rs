//! Search history appended to a JSON-lines file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use muwasala_search::{HistoryRecord, HistorySink, Result, SearchError};
use tokio::io::AsyncWriteExt;

/// Appends one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonlHistorySink {
    path: PathBuf,
}

impl JsonlHistorySink {
    /// Sink writing to `path`. The file and its parent directories are
    /// created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The history file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistorySink for JsonlHistorySink {
    async fn write(&self, record: &HistoryRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| SearchError::Parse(format!("history record: {e}")))?;
        line.push('\n');

        let io_err = |e: std::io::Error| SearchError::Config(format!("history file {}: {e}", self.path.display()));
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use muwasala_search::ResponseOrigin;
    use uuid::Uuid;

    fn record(query: &str) -> HistoryRecord {
        HistoryRecord {
            id: Uuid::new_v4(),
            query: query.into(),
            language: "en".into(),
            topics: vec!["zakat".into()],
            total_found: 4,
            origin: ResponseOrigin::Live,
            elapsed_ms: 840,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn appends_one_line_per_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = JsonlHistorySink::new(dir.path().join("nested").join("history.jsonl"));

        sink.write(&record("zakat on gold")).await.expect("write");
        sink.write(&record("nisab")).await.expect("write");

        let content = std::fs::read_to_string(sink.path()).expect("read");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: HistoryRecord = serde_json::from_str(lines[0]).expect("parse");
        assert_eq!(first.query, "zakat on gold");
        assert_eq!(first.topics, vec!["zakat"]);
    }

    #[tokio::test]
    async fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A directory cannot be opened for appending.
        let sink = JsonlHistorySink::new(dir.path());
        assert!(sink.write(&record("q")).await.is_err());
    }
}
