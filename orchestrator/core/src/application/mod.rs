// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod improvement_analyzer;
pub mod statistical_validator;
pub mod application_gate;
pub mod feedback_loop;
pub mod tracking_service;
pub mod repository_factory;

// Re-export use cases for convenience
pub use application_gate::{ApplicationGate, ApplyError, AppliedProposal};
pub use feedback_loop::{FeedbackLoopSettings, FeedbackLoopUseCase, StandardFeedbackLoopUseCase};
pub use improvement_analyzer::{AnalyzerError, ImprovementAnalyzer};
pub use statistical_validator::{SignificanceTest, WelchTTest};
pub use tracking_service::{StandardTrackingService, TrackingService};
