// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Execution Feedback (Feedback Collection Context)
//!
//! Feedback is read from an external, append-only execution trace store and
//! normalised into [`FeedbackItem`]s. Two narrow interfaces sit at this
//! boundary:
//!
//! - [`ExecutionTraceStore`]: raw trace records for a pattern over a window
//! - [`FeedbackCollector`]: ordered feedback items, the input of the loop
//!
//! A window with no executions yields an empty list, never an error. Errors
//! are reserved for an unreachable or corrupt trace source.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::proposal::ImprovementType;

/// One execution of a pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub execution_id: String,
    pub pattern_id: String,
    pub success: bool,
    /// Wall-clock duration in milliseconds
    #[serde(rename = "duration")]
    pub duration_ms: f64,
    /// 0.0 to 1.0
    pub quality_score: f64,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackItem {
    pub fn failure_indicator(&self) -> f64 {
        if self.success {
            0.0
        } else {
            1.0
        }
    }
}

/// Half-open interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window ending now
    pub fn last(duration: Duration) -> Self {
        let end = Utc::now();
        Self { start: end - duration, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

/// Restricts which improvement classes the analyzer looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    #[default]
    All,
    Performance,
    Quality,
    Reliability,
}

impl FeedbackType {
    pub fn includes(&self, improvement_type: ImprovementType) -> bool {
        match self {
            FeedbackType::All => true,
            FeedbackType::Performance => improvement_type == ImprovementType::Performance,
            FeedbackType::Quality => improvement_type == ImprovementType::Quality,
            FeedbackType::Reliability => improvement_type == ImprovementType::Reliability,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::All => "all",
            FeedbackType::Performance => "performance",
            FeedbackType::Quality => "quality",
            FeedbackType::Reliability => "reliability",
        }
    }
}

impl FromStr for FeedbackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(FeedbackType::All),
            "performance" => Ok(FeedbackType::Performance),
            "quality" => Ok(FeedbackType::Quality),
            "reliability" => Ok(FeedbackType::Reliability),
            other => Err(format!(
                "unknown feedback type '{}' (expected all, performance, quality or reliability)",
                other
            )),
        }
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of a traced execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Success,
    Failure,
    Timeout,
    Cancelled,
}

/// Raw record as exposed by the execution trace store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub execution_id: String,
    pub pattern_id: String,
    /// Milliseconds
    pub duration: f64,
    pub status: TraceStatus,
    #[serde(default)]
    pub quality_score: Option<f64>,
    pub started_at: DateTime<Utc>,
}

impl From<TraceRecord> for FeedbackItem {
    fn from(record: TraceRecord) -> Self {
        let success = record.status == TraceStatus::Success;
        // Unscored executions count as fully good when they succeeded
        let quality_score = record
            .quality_score
            .unwrap_or(if success { 1.0 } else { 0.0 });

        Self {
            execution_id: record.execution_id,
            pattern_id: record.pattern_id,
            success,
            duration_ms: record.duration,
            quality_score,
            timestamp: record.started_at,
        }
    }
}

/// Errors surfaced by a trace source
#[derive(Debug, Clone, thiserror::Error)]
pub enum TraceStoreError {
    #[error("Trace store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt trace data: {0}")]
    Corrupt(String),
}

/// Errors surfaced by a feedback collector
#[derive(Debug, Clone, thiserror::Error)]
pub enum CollectorError {
    #[error(transparent)]
    TraceStore(#[from] TraceStoreError),

    #[error("Invalid time window: start {start} is after end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Read-only, append-only execution history
#[async_trait]
pub trait ExecutionTraceStore: Send + Sync {
    async fn query(
        &self,
        pattern_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<TraceRecord>, TraceStoreError>;
}

/// Retrieves execution feedback for a pattern
#[async_trait]
pub trait FeedbackCollector: Send + Sync {
    /// Items ordered by ascending timestamp; empty when nothing ran in the window
    async fn collect(
        &self,
        pattern_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<FeedbackItem>, CollectorError>;
}
