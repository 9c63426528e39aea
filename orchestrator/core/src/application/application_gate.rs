// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application Gate
//!
//! Decides what happens to a proposal once its significance test is known,
//! and writes auto-applied proposals into the lineage graph.
//!
//! | Validation | Confidence | Effect | Decision |
//! |------------|------------|--------|----------|
//! | significant | ≥ threshold | any | `APPLY_AUTO` |
//! | significant | < threshold | any | `APPLY_MANUAL_REVIEW` |
//! | not significant (tested or not run) | - | > `min_effect_size` | `APPLY_MANUAL_REVIEW` |
//! | insufficient samples / timeout | - | - | `REJECT` |
//! | otherwise | - | - | `REJECT` |

use std::collections::HashMap;

use pattern_lineage::{
    CreateNodeRequest, CreatedNode, LineageError, LineageService, ParentRef,
};
use serde_json::{json, Value};

use crate::domain::gate::GateDecision;
use crate::domain::proposal::{ImprovementProposal, ProposalError, ProposalStatus};
use crate::domain::validation::{ValidationReason, ValidationResult};

pub const APPLIED_BY: &str = "feedback-loop";

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error(transparent)]
    Lineage(#[from] LineageError),

    #[error(transparent)]
    Proposal(#[from] ProposalError),
}

impl ApplyError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApplyError::Lineage(err) if err.is_retryable())
    }
}

/// Lineage write produced by an applied proposal
#[derive(Debug, Clone)]
pub struct AppliedProposal {
    pub node: CreatedNode,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct ApplicationGate {
    min_effect_size: f64,
}

impl Default for ApplicationGate {
    fn default() -> Self {
        Self { min_effect_size: 0.05 }
    }
}

impl ApplicationGate {
    pub fn new(min_effect_size: f64) -> Self {
        Self { min_effect_size }
    }

    pub fn decide(
        &self,
        validation: &ValidationResult,
        proposal: &ImprovementProposal,
        auto_apply_threshold: f64,
    ) -> GateDecision {
        if proposal.status.is_terminal() {
            return GateDecision::Reject;
        }

        if validation.significant {
            return if validation.confidence >= auto_apply_threshold {
                GateDecision::ApplyAuto
            } else {
                GateDecision::ApplyManualReview
            };
        }

        match validation.reason {
            Some(ValidationReason::InsufficientSamples) | Some(ValidationReason::Timeout) => {
                GateDecision::Reject
            }
            _ if validation.relative_effect.abs() > self.min_effect_size => {
                GateDecision::ApplyManualReview
            }
            _ => GateDecision::Reject,
        }
    }

    /// Write the proposal as a new version of its pattern and mark it applied.
    ///
    /// The parent is taken from an uncached ancestry read so the new version
    /// always extends the true latest node.
    pub async fn apply(
        &self,
        lineage: &dyn LineageService,
        proposal: &mut ImprovementProposal,
    ) -> Result<AppliedProposal, ApplyError> {
        if !proposal.status.can_transition_to(ProposalStatus::Applied) {
            return Err(ProposalError::InvalidTransition {
                from: proposal.status,
                to: ProposalStatus::Applied,
            }
            .into());
        }

        let current = lineage.query_ancestry_fresh(&proposal.pattern_id).await?;
        let parent = current.node;
        let version = next_version(&parent.version);

        let request = CreateNodeRequest::derived(
            proposal.pattern_id.clone(),
            version.clone(),
            parent.payload.clone(),
            vec![ParentRef::Node(parent.id)],
            proposal.edge_type(),
            proposal.transformation_type,
        )
        .with_name(parent.name.clone())
        .with_type(parent.pattern_type.clone())
        .with_metadata(application_metadata(proposal))
        .triggered_by(APPLIED_BY)
        .with_reason(format!(
            "{} {} {:?}: {} {:.4} -> {:.4}",
            proposal.improvement_type,
            proposal.metric,
            proposal.direction,
            proposal.id,
            proposal.baseline_value,
            proposal.target_value
        ));

        let node = lineage.create_node(request).await?;
        proposal.transition_to(ProposalStatus::Applied)?;

        tracing::info!(
            pattern_id = %proposal.pattern_id,
            proposal_id = %proposal.id,
            node_id = %node.node_id,
            version = %version,
            "Applied improvement proposal"
        );

        Ok(AppliedProposal { node, version })
    }
}

fn application_metadata(proposal: &ImprovementProposal) -> HashMap<String, Value> {
    let mut metadata = HashMap::new();
    metadata.insert("proposal_id".to_string(), json!(proposal.id.0));
    metadata.insert("correlation_id".to_string(), json!(proposal.correlation_id.0));
    metadata.insert("improvement_type".to_string(), json!(proposal.improvement_type.as_str()));
    metadata.insert("metric".to_string(), json!(proposal.metric));
    metadata.insert("baseline_value".to_string(), json!(proposal.baseline_value));
    metadata.insert("target_value".to_string(), json!(proposal.target_value));
    if let Some(validation) = &proposal.validation {
        metadata.insert("p_value".to_string(), json!(validation.p_value));
        metadata.insert("confidence".to_string(), json!(validation.confidence));
    }
    if !proposal.combined_from.is_empty() {
        let combined: Vec<_> = proposal.combined_from.iter().map(|id| id.0).collect();
        metadata.insert("combined_from".to_string(), json!(combined));
    }
    metadata
}

/// Bump the trailing number of a version string: `1.0` → `1.1`, `v3` → `v4`,
/// `1.9` → `1.10`. Versions without a trailing number get `.1` appended.
pub fn next_version(version: &str) -> String {
    let digits = version
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digits == 0 {
        return format!("{}.1", version);
    }

    let (prefix, number) = version.split_at(version.len() - digits);
    match number.parse::<u64>() {
        Ok(n) => format!("{}{}", prefix, n + 1),
        Err(_) => format!("{}.1", version),
    }
}
