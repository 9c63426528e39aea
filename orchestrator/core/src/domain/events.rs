// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use pattern_lineage::NodeId;
use serde::{Deserialize, Serialize};

use crate::domain::feedback_loop::{CorrelationId, LoopState};
use crate::domain::gate::GateDecision;
use crate::domain::proposal::{ImprovementType, ProposalId};

/// Feedback loop progress events
///
/// Every variant carries the run's correlation id so subscribers can follow
/// a single run across stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FeedbackLoopEvent {
    RunStarted {
        correlation_id: CorrelationId,
        pattern_id: String,
        started_at: DateTime<Utc>,
    },
    StageEntered {
        correlation_id: CorrelationId,
        stage: LoopState,
        entered_at: DateTime<Utc>,
    },
    ProposalValidated {
        correlation_id: CorrelationId,
        proposal_id: ProposalId,
        improvement_type: ImprovementType,
        p_value: f64,
        confidence: f64,
        significant: bool,
        validated_at: DateTime<Utc>,
    },
    ProposalDecided {
        correlation_id: CorrelationId,
        proposal_id: ProposalId,
        decision: GateDecision,
        decided_at: DateTime<Utc>,
    },
    ProposalTracked {
        correlation_id: CorrelationId,
        proposal_id: ProposalId,
        node_id: NodeId,
        version: String,
        tracked_at: DateTime<Utc>,
    },
    ProposalTrackingFailed {
        correlation_id: CorrelationId,
        proposal_id: ProposalId,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    RunCompleted {
        correlation_id: CorrelationId,
        improvements_applied: usize,
        partial_failure: bool,
        completed_at: DateTime<Utc>,
    },
    RunFailed {
        correlation_id: CorrelationId,
        stage: LoopState,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    RunCancelled {
        correlation_id: CorrelationId,
        stage: LoopState,
        cancelled_at: DateTime<Utc>,
    },
}

impl FeedbackLoopEvent {
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            FeedbackLoopEvent::RunStarted { correlation_id, .. }
            | FeedbackLoopEvent::StageEntered { correlation_id, .. }
            | FeedbackLoopEvent::ProposalValidated { correlation_id, .. }
            | FeedbackLoopEvent::ProposalDecided { correlation_id, .. }
            | FeedbackLoopEvent::ProposalTracked { correlation_id, .. }
            | FeedbackLoopEvent::ProposalTrackingFailed { correlation_id, .. }
            | FeedbackLoopEvent::RunCompleted { correlation_id, .. }
            | FeedbackLoopEvent::RunFailed { correlation_id, .. }
            | FeedbackLoopEvent::RunCancelled { correlation_id, .. } => *correlation_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            FeedbackLoopEvent::RunStarted { started_at, .. } => *started_at,
            FeedbackLoopEvent::StageEntered { entered_at, .. } => *entered_at,
            FeedbackLoopEvent::ProposalValidated { validated_at, .. } => *validated_at,
            FeedbackLoopEvent::ProposalDecided { decided_at, .. } => *decided_at,
            FeedbackLoopEvent::ProposalTracked { tracked_at, .. } => *tracked_at,
            FeedbackLoopEvent::ProposalTrackingFailed { failed_at, .. } => *failed_at,
            FeedbackLoopEvent::RunCompleted { completed_at, .. } => *completed_at,
            FeedbackLoopEvent::RunFailed { failed_at, .. } => *failed_at,
            FeedbackLoopEvent::RunCancelled { cancelled_at, .. } => *cancelled_at,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            FeedbackLoopEvent::RunStarted { .. } => "RunStarted",
            FeedbackLoopEvent::StageEntered { .. } => "StageEntered",
            FeedbackLoopEvent::ProposalValidated { .. } => "ProposalValidated",
            FeedbackLoopEvent::ProposalDecided { .. } => "ProposalDecided",
            FeedbackLoopEvent::ProposalTracked { .. } => "ProposalTracked",
            FeedbackLoopEvent::ProposalTrackingFailed { .. } => "ProposalTrackingFailed",
            FeedbackLoopEvent::RunCompleted { .. } => "RunCompleted",
            FeedbackLoopEvent::RunFailed { .. } => "RunFailed",
            FeedbackLoopEvent::RunCancelled { .. } => "RunCancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FeedbackLoopEvent::RunCompleted { .. }
                | FeedbackLoopEvent::RunFailed { .. }
                | FeedbackLoopEvent::RunCancelled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_cover_terminal_events() {
        let correlation_id = CorrelationId::new();
        let event = FeedbackLoopEvent::RunFailed {
            correlation_id,
            stage: LoopState::Collecting,
            reason: "trace store unavailable".to_string(),
            failed_at: Utc::now(),
        };
        assert_eq!(event.correlation_id(), correlation_id);
        assert_eq!(event.event_type(), "RunFailed");
        assert!(event.is_terminal());

        let started = FeedbackLoopEvent::RunStarted {
            correlation_id,
            pattern_id: "p".to_string(),
            started_at: Utc::now(),
        };
        assert!(!started.is_terminal());
    }
}
