// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Statistical Validator
//!
//! Welch's unequal-variance two-sample t-test, two-tailed, with
//! Welch–Satterthwaite degrees of freedom. The p-value comes from the
//! Student's t survival function in `statrs`.
//!
//! The test never fails numerically: arms below the minimum size yield
//! `INSUFFICIENT_SAMPLES`, and a zero standard error yields `p = 1.0`.

use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::domain::validation::{mean, relative, ValidationReason, ValidationResult};

/// Significance test applied to the two arms of a proposal
pub trait SignificanceTest: Send + Sync {
    fn test(
        &self,
        baseline: &[f64],
        candidate: &[f64],
        significance_level: f64,
        min_sample_size: usize,
    ) -> ValidationResult;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WelchTTest;

impl SignificanceTest for WelchTTest {
    fn test(
        &self,
        baseline: &[f64],
        candidate: &[f64],
        significance_level: f64,
        min_sample_size: usize,
    ) -> ValidationResult {
        validate(baseline, candidate, significance_level, min_sample_size)
    }
}

/// Compare `candidate` against `baseline`.
///
/// `t_statistic` is positive when the candidate mean is larger.
pub fn validate(
    baseline: &[f64],
    candidate: &[f64],
    significance_level: f64,
    min_sample_size: usize,
) -> ValidationResult {
    let min = min_sample_size.max(2);
    if baseline.len() < min || candidate.len() < min {
        return ValidationResult::untested(
            ValidationReason::InsufficientSamples,
            baseline,
            candidate,
            significance_level,
        );
    }

    let n1 = baseline.len() as f64;
    let n2 = candidate.len() as f64;
    let m1 = mean(baseline);
    let m2 = mean(candidate);
    let v1 = sample_variance(baseline, m1);
    let v2 = sample_variance(candidate, m2);

    let se1 = v1 / n1;
    let se2 = v2 / n2;
    let se_sq = se1 + se2;
    let mean_difference = m2 - m1;

    if !(se_sq > 0.0 && se_sq.is_finite()) {
        return ValidationResult {
            t_statistic: 0.0,
            p_value: 1.0,
            confidence: 0.0,
            degrees_of_freedom: n1 + n2 - 2.0,
            baseline_n: baseline.len(),
            candidate_n: candidate.len(),
            baseline_mean: m1,
            candidate_mean: m2,
            mean_difference,
            relative_effect: relative(mean_difference, m1),
            significance_level,
            significant: false,
            reason: Some(ValidationReason::ZeroVariance),
        };
    }

    let t_statistic = mean_difference / se_sq.sqrt();
    let df = se_sq.powi(2) / (se1.powi(2) / (n1 - 1.0) + se2.powi(2) / (n2 - 1.0));
    let p_value = two_tailed_p(t_statistic, df);

    ValidationResult {
        t_statistic,
        p_value,
        confidence: ValidationResult::confidence_from_p(p_value),
        degrees_of_freedom: df,
        baseline_n: baseline.len(),
        candidate_n: candidate.len(),
        baseline_mean: m1,
        candidate_mean: m2,
        mean_difference,
        relative_effect: relative(mean_difference, m1),
        significance_level,
        significant: p_value < significance_level,
        reason: None,
    }
}

fn sample_variance(samples: &[f64], mean: f64) -> f64 {
    let n = samples.len();
    if n < 2 {
        return 0.0;
    }
    samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
}

fn two_tailed_p(t: f64, df: f64) -> f64 {
    if !t.is_finite() || !df.is_finite() || df <= 0.0 {
        return 1.0;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => {
            let p = 2.0 * dist.sf(t.abs());
            if p.is_finite() {
                p.clamp(0.0, 1.0)
            } else {
                1.0
            }
        }
        Err(_) => 1.0,
    }
}
