// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Improvement Analyzer
//!
//! Splits a pattern's feedback chronologically into a historical baseline and
//! a recent candidate window, then looks for three classes of change:
//!
//! | Class | Metric | Trigger | Transformation |
//! |-------|--------|---------|----------------|
//! | performance | p50 duration | relative change ≥ `performance_threshold` | optimization |
//! | quality | mean quality score | drop ≥ `quality_threshold` | enhancement |
//! | reliability | failure rate | rise ≥ `reliability_threshold` | bugfix |
//!
//! The analyzer is pure. Too little feedback yields no drafts rather than an
//! error; malformed feedback (non-finite durations, scores outside `[0, 1]`)
//! is an [`AnalyzerError`].

use std::cmp::Ordering;

use crate::domain::feedback::{FeedbackItem, FeedbackType};
use crate::domain::lineage_config::AnalyzerConfig;
use crate::domain::proposal::{ImprovementDirection, ImprovementType, ProposalDraft};
use crate::domain::validation::mean;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalyzerError {
    #[error("Invalid feedback item {execution_id}: {reason}")]
    InvalidFeedback { execution_id: String, reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct ImprovementAnalyzer {
    config: AnalyzerConfig,
}

impl ImprovementAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn analyze(
        &self,
        items: &[FeedbackItem],
        min_sample_size: usize,
    ) -> Result<Vec<ProposalDraft>, AnalyzerError> {
        self.analyze_filtered(items, min_sample_size, FeedbackType::All)
    }

    /// Like [`analyze`](Self::analyze) but only for the classes `feedback_type` includes
    pub fn analyze_filtered(
        &self,
        items: &[FeedbackItem],
        min_sample_size: usize,
        feedback_type: FeedbackType,
    ) -> Result<Vec<ProposalDraft>, AnalyzerError> {
        for item in items {
            check_item(item)?;
        }

        if items.len() < min_sample_size.max(2) {
            tracing::debug!(
                items = items.len(),
                min_sample_size,
                "Insufficient feedback for analysis"
            );
            return Ok(Vec::new());
        }

        let mut ordered: Vec<&FeedbackItem> = items.iter().collect();
        ordered.sort_by_key(|item| item.timestamp);

        let split = self.split_index(ordered.len());
        let (baseline, candidate) = ordered.split_at(split);
        let evidence_count = ordered.len();

        let mut drafts = Vec::new();

        if feedback_type.includes(ImprovementType::Performance) {
            drafts.extend(self.performance(baseline, candidate, evidence_count));
        }
        if feedback_type.includes(ImprovementType::Quality) {
            drafts.extend(self.quality(baseline, candidate, evidence_count));
        }
        if feedback_type.includes(ImprovementType::Reliability) {
            drafts.extend(self.reliability(baseline, candidate, evidence_count));
        }

        tracing::debug!(
            baseline = baseline.len(),
            candidate = candidate.len(),
            drafts = drafts.len(),
            "Feedback analyzed"
        );

        Ok(drafts)
    }

    /// Both arms always get at least one item
    fn split_index(&self, len: usize) -> usize {
        let split = (len as f64 * self.config.baseline_fraction).round() as usize;
        split.clamp(1, len - 1)
    }

    fn performance(
        &self,
        baseline: &[&FeedbackItem],
        candidate: &[&FeedbackItem],
        evidence_count: usize,
    ) -> Option<ProposalDraft> {
        let baseline_samples: Vec<f64> = baseline.iter().map(|i| i.duration_ms).collect();
        let candidate_samples: Vec<f64> = candidate.iter().map(|i| i.duration_ms).collect();

        let baseline_p50 = median(&baseline_samples);
        let candidate_p50 = median(&candidate_samples);
        if baseline_p50 <= 0.0 {
            return None;
        }

        let change = (candidate_p50 - baseline_p50) / baseline_p50;
        if change.abs() < self.config.performance_threshold {
            return None;
        }

        // Faster recent executions are an opportunity to promote
        let (direction, target_value) = if change < 0.0 {
            (ImprovementDirection::Opportunity, candidate_p50)
        } else {
            (ImprovementDirection::Regression, baseline_p50)
        };

        Some(ProposalDraft {
            improvement_type: ImprovementType::Performance,
            direction,
            baseline_value: baseline_p50,
            candidate_value: candidate_p50,
            target_value,
            evidence_count,
            baseline_samples,
            candidate_samples,
        })
    }

    fn quality(
        &self,
        baseline: &[&FeedbackItem],
        candidate: &[&FeedbackItem],
        evidence_count: usize,
    ) -> Option<ProposalDraft> {
        let baseline_samples: Vec<f64> = baseline.iter().map(|i| i.quality_score).collect();
        let candidate_samples: Vec<f64> = candidate.iter().map(|i| i.quality_score).collect();

        let baseline_mean = mean(&baseline_samples);
        let candidate_mean = mean(&candidate_samples);
        if baseline_mean - candidate_mean < self.config.quality_threshold {
            return None;
        }

        Some(ProposalDraft {
            improvement_type: ImprovementType::Quality,
            direction: ImprovementDirection::Regression,
            baseline_value: baseline_mean,
            candidate_value: candidate_mean,
            target_value: baseline_mean,
            evidence_count,
            baseline_samples,
            candidate_samples,
        })
    }

    fn reliability(
        &self,
        baseline: &[&FeedbackItem],
        candidate: &[&FeedbackItem],
        evidence_count: usize,
    ) -> Option<ProposalDraft> {
        let baseline_samples: Vec<f64> = baseline.iter().map(|i| i.failure_indicator()).collect();
        let candidate_samples: Vec<f64> = candidate.iter().map(|i| i.failure_indicator()).collect();

        let baseline_rate = mean(&baseline_samples);
        let candidate_rate = mean(&candidate_samples);
        if candidate_rate - baseline_rate < self.config.reliability_threshold {
            return None;
        }

        Some(ProposalDraft {
            improvement_type: ImprovementType::Reliability,
            direction: ImprovementDirection::Regression,
            baseline_value: baseline_rate,
            candidate_value: candidate_rate,
            target_value: baseline_rate,
            evidence_count,
            baseline_samples,
            candidate_samples,
        })
    }
}

fn check_item(item: &FeedbackItem) -> Result<(), AnalyzerError> {
    let invalid = |reason: String| AnalyzerError::InvalidFeedback {
        execution_id: item.execution_id.clone(),
        reason,
    };

    if !item.duration_ms.is_finite() || item.duration_ms < 0.0 {
        return Err(invalid(format!("duration {} is not a finite non-negative value", item.duration_ms)));
    }
    if !item.quality_score.is_finite() || !(0.0..=1.0).contains(&item.quality_score) {
        return Err(invalid(format!("quality score {} is outside [0, 1]", item.quality_score)));
    }
    Ok(())
}

fn median(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
