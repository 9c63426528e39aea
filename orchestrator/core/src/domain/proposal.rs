// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Improvement Proposals
//!
//! A proposal is a candidate change to a pattern backed by two sample arms
//! (historical baseline and recent candidate). It is created by the analyzer,
//! mutated by the validator and the application gate, and retained forever
//! for audit, rejected ones included.
//!
//! Status only moves forward:
//!
//! ```text
//! Proposed ──▶ Testing ──▶ Validated ──▶ Applied
//!    │            │            │
//!    └────────────┴────────────┴──▶ Rejected
//! ```

use chrono::{DateTime, Utc};
use pattern_lineage::{EdgeType, TransformationType};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::feedback_loop::CorrelationId;
use super::validation::ValidationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub Uuid);

impl ProposalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProposalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Improvement class detected by the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementType {
    Performance,
    Quality,
    Reliability,
}

impl ImprovementType {
    /// Lineage transformation recorded when a proposal of this class is applied
    pub fn transformation_type(&self) -> TransformationType {
        match self {
            ImprovementType::Performance => TransformationType::Optimization,
            ImprovementType::Quality => TransformationType::Enhancement,
            ImprovementType::Reliability => TransformationType::Bugfix,
        }
    }

    /// Name of the metric compared between arms
    pub fn metric(&self) -> &'static str {
        match self {
            ImprovementType::Performance => "duration_p50_ms",
            ImprovementType::Quality => "quality_score_mean",
            ImprovementType::Reliability => "failure_rate",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImprovementType::Performance => "performance",
            ImprovementType::Quality => "quality",
            ImprovementType::Reliability => "reliability",
        }
    }
}

impl fmt::Display for ImprovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the recent window improved on or regressed from the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementDirection {
    /// Recent behaviour is better; promote it
    Opportunity,
    /// Recent behaviour is worse; restore the baseline
    Regression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Proposed,
    Testing,
    Validated,
    Rejected,
    Applied,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalStatus::Rejected | ProposalStatus::Applied)
    }

    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        use ProposalStatus::*;
        matches!(
            (self, next),
            (Proposed, Testing)
                | (Proposed, Rejected)
                | (Testing, Validated)
                | (Testing, Rejected)
                | (Validated, Applied)
                | (Validated, Rejected)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Proposed => "proposed",
            ProposalStatus::Testing => "testing",
            ProposalStatus::Validated => "validated",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Applied => "applied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "proposed" => Some(ProposalStatus::Proposed),
            "testing" => Some(ProposalStatus::Testing),
            "validated" => Some(ProposalStatus::Validated),
            "rejected" => Some(ProposalStatus::Rejected),
            "applied" => Some(ProposalStatus::Applied),
            _ => None,
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProposalError {
    #[error("Invalid proposal transition from {from} to {to}")]
    InvalidTransition {
        from: ProposalStatus,
        to: ProposalStatus,
    },
}

/// Analyzer output before it is bound to a pattern and a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub improvement_type: ImprovementType,
    pub direction: ImprovementDirection,
    /// Metric value over the historical window
    pub baseline_value: f64,
    /// Metric value over the recent window
    pub candidate_value: f64,
    /// Value the proposal moves the pattern towards
    pub target_value: f64,
    pub evidence_count: usize,
    pub baseline_samples: Vec<f64>,
    pub candidate_samples: Vec<f64>,
}

impl ProposalDraft {
    /// Signed relative change of the metric from baseline to candidate
    pub fn relative_change(&self) -> f64 {
        if self.baseline_value.abs() < f64::EPSILON {
            0.0
        } else {
            (self.candidate_value - self.baseline_value) / self.baseline_value.abs()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementProposal {
    pub id: ProposalId,
    pub pattern_id: String,
    pub correlation_id: CorrelationId,
    pub improvement_type: ImprovementType,
    pub direction: ImprovementDirection,
    pub transformation_type: TransformationType,
    pub metric: String,
    pub baseline_value: f64,
    pub candidate_value: f64,
    pub target_value: f64,
    pub evidence_count: usize,
    pub baseline_samples: Vec<f64>,
    pub candidate_samples: Vec<f64>,
    /// Prior proposals folded into this one
    #[serde(default)]
    pub combined_from: Vec<ProposalId>,
    pub status: ProposalStatus,
    pub validation: Option<ValidationResult>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImprovementProposal {
    pub fn from_draft(draft: ProposalDraft, pattern_id: impl Into<String>, correlation_id: CorrelationId) -> Self {
        let now = Utc::now();
        Self {
            id: ProposalId::new(),
            pattern_id: pattern_id.into(),
            correlation_id,
            improvement_type: draft.improvement_type,
            direction: draft.direction,
            transformation_type: draft.improvement_type.transformation_type(),
            metric: draft.improvement_type.metric().to_string(),
            baseline_value: draft.baseline_value,
            candidate_value: draft.candidate_value,
            target_value: draft.target_value,
            evidence_count: draft.evidence_count,
            baseline_samples: draft.baseline_samples,
            candidate_samples: draft.candidate_samples,
            combined_from: Vec::new(),
            status: ProposalStatus::Proposed,
            validation: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold earlier proposals still awaiting review into this one.
    ///
    /// Only their ids are recorded. Successive runs usually observe the same
    /// executions, so `evidence_count` stays this proposal's own. The caller
    /// is responsible for rejecting them as superseded.
    pub fn supersede(&mut self, prior: &[ImprovementProposal]) {
        for p in prior {
            if !self.combined_from.contains(&p.id) {
                self.combined_from.push(p.id);
            }
        }
        self.updated_at = Utc::now();
    }

    /// Awaiting a review decision and comparable with `other`
    pub fn can_fold_into(&self, other: &ImprovementProposal) -> bool {
        self.id != other.id
            && self.pattern_id == other.pattern_id
            && self.improvement_type == other.improvement_type
            && self.direction == other.direction
            && matches!(self.status, ProposalStatus::Proposed | ProposalStatus::Validated)
    }

    pub fn transition_to(&mut self, next: ProposalStatus) -> Result<(), ProposalError> {
        if !self.status.can_transition_to(next) {
            return Err(ProposalError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move to `Rejected` from any non-terminal state
    pub fn reject(&mut self, reason: impl Into<String>) -> Result<(), ProposalError> {
        self.transition_to(ProposalStatus::Rejected)?;
        self.rejection_reason = Some(reason.into());
        Ok(())
    }

    /// `merged_from` when this proposal combines prior ones, `modified_from` otherwise
    pub fn edge_type(&self) -> EdgeType {
        if self.combined_from.is_empty() {
            EdgeType::ModifiedFrom
        } else {
            EdgeType::MergedFrom
        }
    }

    pub fn relative_change(&self) -> f64 {
        if self.baseline_value.abs() < f64::EPSILON {
            0.0
        } else {
            (self.candidate_value - self.baseline_value) / self.baseline_value.abs()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal() -> ImprovementProposal {
        ImprovementProposal::from_draft(
            ProposalDraft {
                improvement_type: ImprovementType::Performance,
                direction: ImprovementDirection::Opportunity,
                baseline_value: 450.0,
                candidate_value: 180.0,
                target_value: 180.0,
                evidence_count: 150,
                baseline_samples: vec![450.0; 75],
                candidate_samples: vec![180.0; 75],
            },
            "writer",
            CorrelationId::new(),
        )
    }

    #[test]
    fn test_forward_transitions() {
        let mut p = proposal();
        assert_eq!(p.transformation_type, TransformationType::Optimization);
        p.transition_to(ProposalStatus::Testing).unwrap();
        p.transition_to(ProposalStatus::Validated).unwrap();
        p.transition_to(ProposalStatus::Applied).unwrap();
        assert!(p.status.is_terminal());
    }

    #[test]
    fn test_status_never_reverts() {
        let mut p = proposal();
        p.transition_to(ProposalStatus::Testing).unwrap();
        p.transition_to(ProposalStatus::Validated).unwrap();

        let err = p.transition_to(ProposalStatus::Testing).unwrap_err();
        assert_eq!(
            err,
            ProposalError::InvalidTransition {
                from: ProposalStatus::Validated,
                to: ProposalStatus::Testing
            }
        );

        p.reject("manual").unwrap();
        assert!(p.transition_to(ProposalStatus::Applied).is_err());
        assert!(p.reject("again").is_err());
        assert_eq!(p.rejection_reason.as_deref(), Some("manual"));
    }

    #[test]
    fn test_cannot_apply_without_validation() {
        let mut p = proposal();
        assert!(p.transition_to(ProposalStatus::Applied).is_err());
    }

    #[test]
    fn test_superseding_proposal_uses_merge_edge() {
        let mut pending = proposal();
        pending.transition_to(ProposalStatus::Testing).unwrap();
        pending.transition_to(ProposalStatus::Validated).unwrap();
        let mut fresh = proposal();
        assert_eq!(fresh.edge_type(), EdgeType::ModifiedFrom);
        assert!(pending.can_fold_into(&fresh));

        fresh.supersede(std::slice::from_ref(&pending));
        assert_eq!(fresh.combined_from, vec![pending.id]);
        assert_eq!(fresh.edge_type(), EdgeType::MergedFrom);
        assert_eq!(fresh.evidence_count, 150);

        fresh.supersede(std::slice::from_ref(&pending));
        assert_eq!(fresh.combined_from.len(), 1);

        pending.reject("superseded").unwrap();
        assert!(!pending.can_fold_into(&fresh));
    }

    #[test]
    fn test_relative_change() {
        let p = proposal();
        assert!((p.relative_change() + 0.6).abs() < 1e-9);
    }
}
