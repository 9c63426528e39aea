// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Significance test outcomes
//!
//! A [`ValidationResult`] is the only input the application gate trusts. When
//! no test could be run (too few samples, timeout, A/B testing disabled) the
//! result is non-significant with a [`ValidationReason`] explaining why.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cap applied to `1 - p_value`
pub const MAX_CONFIDENCE: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationReason {
    InsufficientSamples,
    Timeout,
    /// Both arms constant; no evidence of a difference
    ZeroVariance,
    NotTested,
}

impl ValidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::InsufficientSamples => "INSUFFICIENT_SAMPLES",
            ValidationReason::Timeout => "TIMEOUT",
            ValidationReason::ZeroVariance => "ZERO_VARIANCE",
            ValidationReason::NotTested => "NOT_TESTED",
        }
    }
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub t_statistic: f64,
    pub p_value: f64,
    /// `1 - p_value`, capped at [`MAX_CONFIDENCE`]
    pub confidence: f64,
    pub degrees_of_freedom: f64,
    pub baseline_n: usize,
    pub candidate_n: usize,
    pub baseline_mean: f64,
    pub candidate_mean: f64,
    /// `candidate_mean - baseline_mean`
    pub mean_difference: f64,
    /// `mean_difference / |baseline_mean|`, 0 when the baseline mean is 0
    pub relative_effect: f64,
    /// Level the p-value was compared against (after any correction)
    pub significance_level: f64,
    pub significant: bool,
    pub reason: Option<ValidationReason>,
}

impl ValidationResult {
    pub fn confidence_from_p(p_value: f64) -> f64 {
        (1.0 - p_value).clamp(0.0, MAX_CONFIDENCE)
    }

    /// Non-significant result carrying descriptive statistics only
    pub fn untested(
        reason: ValidationReason,
        baseline: &[f64],
        candidate: &[f64],
        significance_level: f64,
    ) -> Self {
        let baseline_mean = mean(baseline);
        let candidate_mean = mean(candidate);
        let mean_difference = candidate_mean - baseline_mean;

        Self {
            t_statistic: 0.0,
            p_value: 1.0,
            confidence: 0.0,
            degrees_of_freedom: 0.0,
            baseline_n: baseline.len(),
            candidate_n: candidate.len(),
            baseline_mean,
            candidate_mean,
            mean_difference,
            relative_effect: relative(mean_difference, baseline_mean),
            significance_level,
            significant: false,
            reason: Some(reason),
        }
    }

    pub fn is_tested(&self) -> bool {
        !matches!(
            self.reason,
            Some(ValidationReason::InsufficientSamples)
                | Some(ValidationReason::Timeout)
                | Some(ValidationReason::NotTested)
        )
    }
}

pub(crate) fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    }
}

pub(crate) fn relative(difference: f64, base: f64) -> f64 {
    if base.abs() < f64::EPSILON {
        0.0
    } else {
        difference / base.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_capped() {
        assert_eq!(ValidationResult::confidence_from_p(0.0), MAX_CONFIDENCE);
        assert_eq!(ValidationResult::confidence_from_p(0.003), MAX_CONFIDENCE);
        assert!((ValidationResult::confidence_from_p(0.2) - 0.8).abs() < 1e-12);
        assert_eq!(ValidationResult::confidence_from_p(1.0), 0.0);
    }

    #[test]
    fn test_untested_result_is_not_significant() {
        let result = ValidationResult::untested(
            ValidationReason::InsufficientSamples,
            &[10.0, 12.0],
            &[5.0, 6.0],
            0.05,
        );
        assert!(!result.significant);
        assert_eq!(result.p_value, 1.0);
        assert_eq!(result.baseline_n, 2);
        assert!((result.relative_effect + 0.5).abs() < 1e-12);
        assert!(!result.is_tested());
    }

    #[test]
    fn test_reason_wire_format() {
        let json = serde_json::to_value(ValidationReason::InsufficientSamples).unwrap();
        assert_eq!(json, "INSUFFICIENT_SAMPLES");
    }
}
