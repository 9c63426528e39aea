// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Feedback Loop Run (State Machine)
//!
//! One run processes one pattern through five stages:
//!
//! ```text
//! COLLECTING → ANALYZING → VALIDATING → APPLYING → TRACKING → COMPLETED
//! ```
//!
//! - `COMPLETED` is reachable early from any stage (nothing left to do).
//! - `FAILED` is reachable from any non-terminal stage.
//! - `CANCELLED` is entered only between stages.
//!
//! Per-proposal results never escape as errors; they are collected into
//! [`ProposalOutcome`]s and summarised by [`StageStatus`] in the final
//! [`FeedbackLoopReport`].

use chrono::{DateTime, Utc};
use pattern_lineage::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::feedback::{CollectorError, FeedbackType, TimeWindow};
use super::gate::GateDecision;
use super::proposal::{ImprovementType, ProposalId, ProposalStatus};
use super::validation::ValidationResult;

/// Threads through every stage output, event and log line of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopState {
    Collecting,
    Analyzing,
    Validating,
    Applying,
    Tracking,
    Completed,
    Failed,
    Cancelled,
}

impl LoopState {
    pub const STAGES: [LoopState; 5] = [
        LoopState::Collecting,
        LoopState::Analyzing,
        LoopState::Validating,
        LoopState::Applying,
        LoopState::Tracking,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Completed | LoopState::Failed | LoopState::Cancelled)
    }

    /// The stage that normally follows this one
    pub fn next_stage(&self) -> Option<LoopState> {
        match self {
            LoopState::Collecting => Some(LoopState::Analyzing),
            LoopState::Analyzing => Some(LoopState::Validating),
            LoopState::Validating => Some(LoopState::Applying),
            LoopState::Applying => Some(LoopState::Tracking),
            LoopState::Tracking => Some(LoopState::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Collecting => "COLLECTING",
            LoopState::Analyzing => "ANALYZING",
            LoopState::Validating => "VALIDATING",
            LoopState::Applying => "APPLYING",
            LoopState::Tracking => "TRACKING",
            LoopState::Completed => "COMPLETED",
            LoopState::Failed => "FAILED",
            LoopState::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    /// Some proposals failed in this stage; siblings were unaffected
    PartialFailure,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingStatus {
    NotAttempted,
    Tracked,
    FailedToTrack,
}

/// Terminal record of one proposal within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalOutcome {
    pub proposal_id: ProposalId,
    pub correlation_id: CorrelationId,
    pub improvement_type: ImprovementType,
    pub status: ProposalStatus,
    pub validation: Option<ValidationResult>,
    pub decision: Option<GateDecision>,
    pub tracking: TrackingStatus,
    pub node_id: Option<NodeId>,
    pub version: Option<String>,
    pub error: Option<String>,
}

/// Structural failure that aborted a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageFailure {
    pub correlation_id: CorrelationId,
    pub stage: LoopState,
    pub message: String,
}

/// Parameters of one feedback loop invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackLoopRequest {
    pub pattern_id: String,
    pub feedback_type: FeedbackType,
    pub time_window: TimeWindow,
    pub auto_apply_threshold: f64,
    pub min_sample_size: usize,
    pub significance_level: f64,
    pub enable_ab_testing: bool,
}

impl FeedbackLoopRequest {
    pub fn validate(&self) -> Result<(), FeedbackLoopError> {
        if self.pattern_id.trim().is_empty() {
            return Err(FeedbackLoopError::InvalidRequest("pattern_id cannot be empty".to_string()));
        }
        if !self.time_window.is_valid() {
            return Err(FeedbackLoopError::InvalidRequest(format!(
                "time window start {} is after end {}",
                self.time_window.start, self.time_window.end
            )));
        }
        if !(self.auto_apply_threshold > 0.0 && self.auto_apply_threshold <= 1.0) {
            return Err(FeedbackLoopError::InvalidRequest(format!(
                "auto_apply_threshold must be in (0, 1], got {}",
                self.auto_apply_threshold
            )));
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(FeedbackLoopError::InvalidRequest(format!(
                "significance_level must be in (0, 1), got {}",
                self.significance_level
            )));
        }
        if self.min_sample_size < 2 {
            return Err(FeedbackLoopError::InvalidRequest(format!(
                "min_sample_size must be at least 2, got {}",
                self.min_sample_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackLoopReport {
    pub correlation_id: CorrelationId,
    pub pattern_id: String,
    pub success: bool,
    pub final_state: LoopState,
    pub feedback_collected: usize,
    pub improvements_identified: usize,
    pub improvements_validated: usize,
    pub improvements_applied: usize,
    pub improvements_pending_review: usize,
    pub improvements_rejected: usize,
    /// Relative metric change of the strongest applied proposal
    pub performance_delta: Option<f64>,
    /// Confidence of the most significant tested proposal
    pub confidence_score: Option<f64>,
    pub p_value: Option<f64>,
    pub statistically_significant: bool,
    pub stage_statuses: BTreeMap<LoopState, StageStatus>,
    pub partial_failure: bool,
    pub outcomes: Vec<ProposalOutcome>,
    pub failure: Option<StageFailure>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedbackLoopError {
    #[error("Invalid feedback loop request: {0}")]
    InvalidRequest(String),

    #[error("Feedback collection failed: {0}")]
    Collector(#[from] CollectorError),

    #[error("Feedback analysis failed: {0}")]
    Analyzer(String),

    #[error("Invalid loop transition from {from} to {to}")]
    InvalidTransition { from: LoopState, to: LoopState },
}

/// Mutable state of one run
#[derive(Debug, Clone)]
pub struct FeedbackLoopRun {
    pub correlation_id: CorrelationId,
    pub pattern_id: String,
    pub state: LoopState,
    pub stage_statuses: BTreeMap<LoopState, StageStatus>,
    pub history: Vec<LoopState>,
    pub started_at: DateTime<Utc>,
}

impl FeedbackLoopRun {
    pub fn start(pattern_id: impl Into<String>, correlation_id: CorrelationId) -> Self {
        let mut stage_statuses: BTreeMap<LoopState, StageStatus> = LoopState::STAGES
            .iter()
            .map(|stage| (*stage, StageStatus::Pending))
            .collect();
        stage_statuses.insert(LoopState::Collecting, StageStatus::Running);

        Self {
            correlation_id,
            pattern_id: pattern_id.into(),
            state: LoopState::Collecting,
            stage_statuses,
            history: vec![LoopState::Collecting],
            started_at: Utc::now(),
        }
    }

    /// Move to `next`, closing the current stage and opening the next one.
    ///
    /// Early completion marks every stage not yet entered as skipped.
    pub fn advance(&mut self, next: LoopState) -> Result<(), FeedbackLoopError> {
        let legal = !self.state.is_terminal()
            && (self.state.next_stage() == Some(next)
                || matches!(next, LoopState::Completed | LoopState::Failed | LoopState::Cancelled));
        if !legal {
            return Err(FeedbackLoopError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        let closing = if next == LoopState::Failed {
            StageStatus::Failed
        } else {
            StageStatus::Completed
        };
        if let Some(status) = self.stage_statuses.get_mut(&self.state) {
            if *status == StageStatus::Running {
                *status = closing;
            }
        }

        if next.is_terminal() {
            for status in self.stage_statuses.values_mut() {
                if *status == StageStatus::Pending {
                    *status = StageStatus::Skipped;
                }
            }
        } else {
            self.stage_statuses.insert(next, StageStatus::Running);
        }

        self.state = next;
        self.history.push(next);
        Ok(())
    }

    pub fn mark_stage(&mut self, stage: LoopState, status: StageStatus) {
        self.stage_statuses.insert(stage, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_run_closes_every_stage() {
        let mut run = FeedbackLoopRun::start("p", CorrelationId::new());
        for next in [
            LoopState::Analyzing,
            LoopState::Validating,
            LoopState::Applying,
            LoopState::Tracking,
            LoopState::Completed,
        ] {
            run.advance(next).unwrap();
        }

        assert_eq!(run.state, LoopState::Completed);
        assert!(run
            .stage_statuses
            .values()
            .all(|status| *status == StageStatus::Completed));
        assert_eq!(run.history.len(), 6);
    }

    #[test]
    fn test_early_completion_skips_remaining_stages() {
        let mut run = FeedbackLoopRun::start("p", CorrelationId::new());
        run.advance(LoopState::Completed).unwrap();

        assert_eq!(run.stage_statuses[&LoopState::Collecting], StageStatus::Completed);
        assert_eq!(run.stage_statuses[&LoopState::Analyzing], StageStatus::Skipped);
        assert_eq!(run.stage_statuses[&LoopState::Tracking], StageStatus::Skipped);
    }

    #[test]
    fn test_failure_marks_current_stage() {
        let mut run = FeedbackLoopRun::start("p", CorrelationId::new());
        run.advance(LoopState::Analyzing).unwrap();
        run.advance(LoopState::Failed).unwrap();

        assert_eq!(run.stage_statuses[&LoopState::Collecting], StageStatus::Completed);
        assert_eq!(run.stage_statuses[&LoopState::Analyzing], StageStatus::Failed);
        assert_eq!(run.stage_statuses[&LoopState::Validating], StageStatus::Skipped);
    }

    #[test]
    fn test_stages_cannot_be_skipped_or_reentered() {
        let mut run = FeedbackLoopRun::start("p", CorrelationId::new());
        assert!(run.advance(LoopState::Validating).is_err());

        run.advance(LoopState::Cancelled).unwrap();
        assert!(run.advance(LoopState::Analyzing).is_err());
        assert!(run.advance(LoopState::Completed).is_err());
    }

    #[test]
    fn test_invalid_request_is_rejected() {
        let request = FeedbackLoopRequest {
            pattern_id: "p".to_string(),
            feedback_type: FeedbackType::All,
            time_window: TimeWindow::last(chrono::Duration::days(1)),
            auto_apply_threshold: 0.95,
            min_sample_size: 1,
            significance_level: 0.05,
            enable_ab_testing: true,
        };
        assert!(matches!(request.validate(), Err(FeedbackLoopError::InvalidRequest(_))));
    }
}
