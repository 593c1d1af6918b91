//! Fire-and-forget search history.
//!
//! [`HistoryQueue::try_record`] drops records into a bounded channel and
//! returns at once; a background writer task hands them to a
//! [`HistorySink`]. A full queue or a failing sink loses records, never
//! slows a search.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{AggregatedResponse, QueryContext, ResponseOrigin};

/// Default number of records the queue holds before dropping.
pub const DEFAULT_HISTORY_CAPACITY: usize = 256;

/// One completed search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Unique record id.
    pub id: Uuid,
    /// Query text.
    pub query: String,
    /// Query language.
    pub language: String,
    /// Topics the classifier tagged.
    pub topics: Vec<String>,
    /// Results found across all pages.
    pub total_found: usize,
    /// Which path answered.
    pub origin: ResponseOrigin,
    /// Time spent answering, in milliseconds.
    pub elapsed_ms: u64,
    /// When the search finished.
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    /// Record for `response` to the query described by `ctx`.
    pub fn from_response(ctx: &QueryContext, response: &AggregatedResponse) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: response.query.clone(),
            language: ctx.language.clone(),
            topics: ctx.topics.clone(),
            total_found: response.total_found,
            origin: response.origin,
            elapsed_ms: response.elapsed.as_millis().try_into().unwrap_or(u64::MAX),
            timestamp: Utc::now(),
        }
    }
}

/// Where history records end up.
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Persist one record.
    ///
    /// # Errors
    ///
    /// Any failure; the writer logs it and moves on.
    async fn write(&self, record: &HistoryRecord) -> Result<()>;
}

/// Sink that only logs each record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHistorySink;

#[async_trait]
impl HistorySink for TracingHistorySink {
    async fn write(&self, record: &HistoryRecord) -> Result<()> {
        tracing::info!(
            id = %record.id,
            origin = %record.origin,
            total_found = record.total_found,
            elapsed_ms = record.elapsed_ms,
            "search recorded"
        );
        Ok(())
    }
}

/// Bounded queue feeding a background writer.
#[derive(Debug)]
pub struct HistoryQueue {
    tx: mpsc::Sender<HistoryRecord>,
    writer: JoinHandle<()>,
}

impl HistoryQueue {
    /// Spawn the writer task for `sink`. Must be called inside a tokio
    /// runtime.
    pub fn spawn(sink: Arc<dyn HistorySink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<HistoryRecord>(capacity.max(1));
        let writer = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(err) = sink.write(&record).await {
                    tracing::warn!(id = %record.id, error = %err, "history sink failed");
                }
            }
            tracing::debug!("history writer stopped");
        });
        Self { tx, writer }
    }

    /// Queue `record` without waiting. Returns whether it was accepted.
    pub fn try_record(&self, record: HistoryRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(record)) => {
                tracing::warn!(id = %record.id, "history queue full, record dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                tracing::warn!(id = %record.id, "history writer gone, record dropped");
                false
            }
        }
    }

    /// Stop accepting records and wait for the writer to drain the queue.
    pub async fn shutdown(self) {
        let Self { tx, writer } = self;
        drop(tx);
        if let Err(err) = writer.await {
            tracing::warn!(error = %err, "history writer ended abnormally");
        }
    }
}
