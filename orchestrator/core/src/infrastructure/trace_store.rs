// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Execution trace store adapters and the feedback collector built on them
//!
//! - [`InMemoryTraceStore`]: appendable in-process store for tests and embedding
//! - [`JsonFileTraceStore`]: reads a JSON array or JSON Lines file of trace records
//! - [`TraceStoreFeedbackCollector`]: adapts any [`ExecutionTraceStore`] to
//!   [`FeedbackCollector`]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::feedback::{
    CollectorError, ExecutionTraceStore, FeedbackCollector, FeedbackItem, TimeWindow, TraceRecord,
    TraceStoreError,
};

#[derive(Clone, Default)]
pub struct InMemoryTraceStore {
    records: Arc<RwLock<Vec<TraceRecord>>>,
}

impl InMemoryTraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<TraceRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    pub async fn append(&self, record: TraceRecord) {
        self.records.write().await.push(record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl ExecutionTraceStore for InMemoryTraceStore {
    async fn query(
        &self,
        pattern_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<TraceRecord>, TraceStoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.pattern_id == pattern_id && window.contains(r.started_at))
            .cloned()
            .collect())
    }
}

/// Trace records read from disk on every query
#[derive(Debug, Clone)]
pub struct JsonFileTraceStore {
    path: PathBuf,
}

impl JsonFileTraceStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, content: &str) -> Result<Vec<TraceRecord>, TraceStoreError> {
        let corrupt = |line: Option<usize>, e: serde_json::Error| {
            let location = match line {
                Some(n) => format!("{}:{}", self.path.display(), n),
                None => self.path.display().to_string(),
            };
            TraceStoreError::Corrupt(format!("{}: {}", location, e))
        };

        let trimmed = content.trim_start();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        if trimmed.starts_with('[') {
            return serde_json::from_str(trimmed).map_err(|e| corrupt(None, e));
        }

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| serde_json::from_str(line).map_err(|e| corrupt(Some(i + 1), e)))
            .collect()
    }
}

#[async_trait]
impl ExecutionTraceStore for JsonFileTraceStore {
    async fn query(
        &self,
        pattern_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<TraceRecord>, TraceStoreError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            TraceStoreError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;

        Ok(self
            .parse(&content)?
            .into_iter()
            .filter(|r| r.pattern_id == pattern_id && window.contains(r.started_at))
            .collect())
    }
}

pub struct TraceStoreFeedbackCollector {
    store: Arc<dyn ExecutionTraceStore>,
}

impl TraceStoreFeedbackCollector {
    pub fn new(store: Arc<dyn ExecutionTraceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FeedbackCollector for TraceStoreFeedbackCollector {
    async fn collect(
        &self,
        pattern_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<FeedbackItem>, CollectorError> {
        if !window.is_valid() {
            return Err(CollectorError::InvalidWindow {
                start: window.start,
                end: window.end,
            });
        }

        let records = self.store.query(pattern_id, window).await?;

        // Stores are not trusted to honour the filter or the ordering
        let mut items: Vec<FeedbackItem> = records
            .into_iter()
            .filter(|r| r.pattern_id == pattern_id && window.contains(r.started_at))
            .map(FeedbackItem::from)
            .collect();
        items.sort_by_key(|item| item.timestamp);

        tracing::debug!(pattern_id = %pattern_id, items = items.len(), "Feedback collected");
        Ok(items)
    }
}
