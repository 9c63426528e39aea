// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Run Feedback Loop Use Case
//!
//! Drives one pattern through COLLECTING → ANALYZING → VALIDATING → APPLYING
//! → TRACKING and returns a [`FeedbackLoopReport`].
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Orchestrate the feedback loop state machine
//! - **Collaborators:**
//!   - Domain: `FeedbackLoopRun`, `ImprovementProposal`
//!   - Application: `ImprovementAnalyzer`, `SignificanceTest`, `ApplicationGate`
//!   - Infrastructure: `FeedbackCollector`, `LineageService`, `ProposalRepository`, `EventBus`
//!
//! Structural failures in COLLECTING and ANALYZING end the run in FAILED;
//! everything after that is isolated per proposal. Cancellation is observed
//! only between stages, so lineage writes already made are kept.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use pattern_lineage::{LineageEventType, LineageId, LineageService, NodeId};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::application::application_gate::{ApplicationGate, ApplyError, APPLIED_BY};
use crate::application::improvement_analyzer::ImprovementAnalyzer;
use crate::application::statistical_validator::{SignificanceTest, WelchTTest};
use crate::domain::events::FeedbackLoopEvent;
use crate::domain::feedback::FeedbackCollector;
use crate::domain::feedback_loop::{
    CorrelationId, FeedbackLoopError, FeedbackLoopReport, FeedbackLoopRequest, FeedbackLoopRun,
    LoopState, ProposalOutcome, StageFailure, StageStatus, TrackingStatus,
};
use crate::domain::gate::GateDecision;
use crate::domain::lineage_config::LineageConfigSpec;
use crate::domain::proposal::{ImprovementProposal, ProposalStatus};
use crate::domain::repository::ProposalRepository;
use crate::domain::validation::{ValidationReason, ValidationResult};
use crate::infrastructure::event_bus::EventBus;

/// Tunables that are not part of a single request
#[derive(Debug, Clone)]
pub struct FeedbackLoopSettings {
    pub bonferroni_correction: bool,
    pub min_effect_size: f64,
    pub validation_timeout: Duration,
    pub tracking_retry_backoff: Duration,
}

impl Default for FeedbackLoopSettings {
    fn default() -> Self {
        Self {
            bonferroni_correction: true,
            min_effect_size: 0.05,
            validation_timeout: Duration::from_secs(30),
            tracking_retry_backoff: Duration::from_millis(100),
        }
    }
}

#[async_trait]
pub trait FeedbackLoopUseCase: Send + Sync {
    /// Run the loop for one pattern.
    ///
    /// Only an invalid request is an `Err`; stage failures and cancellation
    /// are reported through [`FeedbackLoopReport::final_state`].
    async fn run(
        &self,
        request: FeedbackLoopRequest,
        cancel: CancellationToken,
    ) -> Result<FeedbackLoopReport, FeedbackLoopError>;
}

pub struct StandardFeedbackLoopUseCase {
    collector: Arc<dyn FeedbackCollector>,
    analyzer: ImprovementAnalyzer,
    significance_test: Arc<dyn SignificanceTest>,
    gate: ApplicationGate,
    lineage: Arc<dyn LineageService>,
    proposals: Arc<dyn ProposalRepository>,
    event_bus: Arc<EventBus>,
    settings: FeedbackLoopSettings,
    lineage_locks: DashMap<LineageId, Arc<Mutex<()>>>,
}

impl StandardFeedbackLoopUseCase {
    pub fn new(
        collector: Arc<dyn FeedbackCollector>,
        lineage: Arc<dyn LineageService>,
        proposals: Arc<dyn ProposalRepository>,
        event_bus: Arc<EventBus>,
        spec: &LineageConfigSpec,
    ) -> Self {
        let fl = &spec.feedback_loop;
        Self {
            collector,
            analyzer: ImprovementAnalyzer::new(spec.analyzer.clone()),
            significance_test: Arc::new(WelchTTest),
            gate: ApplicationGate::new(fl.min_effect_size),
            lineage,
            proposals,
            event_bus,
            settings: FeedbackLoopSettings {
                bonferroni_correction: fl.bonferroni_correction,
                min_effect_size: fl.min_effect_size,
                validation_timeout: fl.validation_timeout,
                tracking_retry_backoff: fl.tracking_retry_backoff,
            },
            lineage_locks: DashMap::new(),
        }
    }

    pub fn with_significance_test(mut self, test: Arc<dyn SignificanceTest>) -> Self {
        self.significance_test = test;
        self
    }

    pub fn with_settings(mut self, settings: FeedbackLoopSettings) -> Self {
        self.gate = ApplicationGate::new(settings.min_effect_size);
        self.settings = settings;
        self
    }
}

/// Per-proposal bookkeeping for the lifetime of a run
struct ProposalSlot {
    proposal: ImprovementProposal,
    /// Pending proposals this one replaces once it validates
    supersedes: Vec<ImprovementProposal>,
    decision: Option<GateDecision>,
    tracking: TrackingStatus,
    node_id: Option<NodeId>,
    version: Option<String>,
    error: Option<String>,
}

impl ProposalSlot {
    fn new(proposal: ImprovementProposal) -> Self {
        Self {
            proposal,
            supersedes: Vec::new(),
            decision: None,
            tracking: TrackingStatus::NotAttempted,
            node_id: None,
            version: None,
            error: None,
        }
    }

    fn outcome(&self) -> ProposalOutcome {
        ProposalOutcome {
            proposal_id: self.proposal.id,
            correlation_id: self.proposal.correlation_id,
            improvement_type: self.proposal.improvement_type,
            status: self.proposal.status,
            validation: self.proposal.validation.clone(),
            decision: self.decision,
            tracking: self.tracking,
            node_id: self.node_id,
            version: self.version.clone(),
            error: self.error.clone(),
        }
    }
}

struct RunContext {
    request: FeedbackLoopRequest,
    run: FeedbackLoopRun,
    slots: Vec<ProposalSlot>,
    feedback_collected: usize,
    partial_failure: bool,
    failure: Option<StageFailure>,
    started: Instant,
}

impl RunContext {
    fn correlation_id(&self) -> CorrelationId {
        self.run.correlation_id
    }
}

#[async_trait]
impl FeedbackLoopUseCase for StandardFeedbackLoopUseCase {
    async fn run(
        &self,
        request: FeedbackLoopRequest,
        cancel: CancellationToken,
    ) -> Result<FeedbackLoopReport, FeedbackLoopError> {
        request.validate()?;

        let correlation_id = CorrelationId::new();
        let span = tracing::info_span!(
            "feedback_loop",
            correlation_id = %correlation_id,
            pattern_id = %request.pattern_id
        );

        self.execute(request, correlation_id, cancel).instrument(span).await
    }
}

impl StandardFeedbackLoopUseCase {
    async fn execute(
        &self,
        request: FeedbackLoopRequest,
        correlation_id: CorrelationId,
        cancel: CancellationToken,
    ) -> Result<FeedbackLoopReport, FeedbackLoopError> {
        let mut ctx = RunContext {
            run: FeedbackLoopRun::start(request.pattern_id.clone(), correlation_id),
            request,
            slots: Vec::new(),
            feedback_collected: 0,
            partial_failure: false,
            failure: None,
            started: Instant::now(),
        };

        info!("Feedback loop started");
        self.publish(FeedbackLoopEvent::RunStarted {
            correlation_id,
            pattern_id: ctx.request.pattern_id.clone(),
            started_at: ctx.run.started_at,
        });
        self.stage_entered(&ctx);

        // COLLECTING
        let items = match self
            .collector
            .collect(&ctx.request.pattern_id, ctx.request.time_window)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                let err = FeedbackLoopError::Collector(e);
                return self.fail(ctx, err.to_string());
            }
        };
        ctx.feedback_collected = items.len();
        debug!(feedback_collected = items.len(), "Feedback collected");

        if items.len() < ctx.request.min_sample_size {
            info!(
                feedback_collected = items.len(),
                min_sample_size = ctx.request.min_sample_size,
                "Insufficient feedback, nothing to analyze"
            );
            return self.complete(ctx);
        }

        // ANALYZING
        if let Some(report) = self.enter(&mut ctx, LoopState::Analyzing, &cancel)? {
            return Ok(report);
        }
        let drafts = match self.analyzer.analyze_filtered(
            &items,
            ctx.request.min_sample_size,
            ctx.request.feedback_type,
        ) {
            Ok(drafts) => drafts,
            Err(e) => {
                let err = FeedbackLoopError::Analyzer(e.to_string());
                return self.fail(ctx, err.to_string());
            }
        };
        if drafts.is_empty() {
            info!("No improvement opportunities identified");
            return self.complete(ctx);
        }

        let prior = match self.proposals.find_by_pattern(&ctx.request.pattern_id).await {
            Ok(prior) => prior,
            Err(e) => {
                warn!(error = %e, "Failed to load prior proposals");
                Vec::new()
            }
        };
        for draft in drafts {
            let proposal =
                ImprovementProposal::from_draft(draft, ctx.request.pattern_id.clone(), correlation_id);
            let mut slot = ProposalSlot::new(proposal);
            slot.supersedes = prior
                .iter()
                .filter(|p| p.can_fold_into(&slot.proposal))
                .cloned()
                .collect();
            self.persist(&slot.proposal).await;
            ctx.slots.push(slot);
        }
        info!(improvements_identified = ctx.slots.len(), "Improvement proposals created");

        // VALIDATING
        if let Some(report) = self.enter(&mut ctx, LoopState::Validating, &cancel)? {
            return Ok(report);
        }
        self.validate(&mut ctx).await;
        self.supersede_pending(&mut ctx).await;

        if ctx.slots.iter().all(|s| s.proposal.status.is_terminal()) {
            info!("No proposal survived validation");
            return self.complete(ctx);
        }

        // APPLYING
        if let Some(report) = self.enter(&mut ctx, LoopState::Applying, &cancel)? {
            return Ok(report);
        }
        self.decide(&mut ctx).await;

        if !ctx
            .slots
            .iter()
            .any(|s| s.decision == Some(GateDecision::ApplyAuto))
        {
            return self.complete(ctx);
        }

        // TRACKING
        if let Some(report) = self.enter(&mut ctx, LoopState::Tracking, &cancel)? {
            return Ok(report);
        }
        self.track(&mut ctx).await;

        self.complete(ctx)
    }

    /// Cancel at the boundary or open `stage`
    fn enter(
        &self,
        ctx: &mut RunContext,
        stage: LoopState,
        cancel: &CancellationToken,
    ) -> Result<Option<FeedbackLoopReport>, FeedbackLoopError> {
        if cancel.is_cancelled() {
            let at = ctx.run.state;
            ctx.run.advance(LoopState::Cancelled)?;
            info!(stage = %at, "Feedback loop cancelled");
            self.publish(FeedbackLoopEvent::RunCancelled {
                correlation_id: ctx.correlation_id(),
                stage: at,
                cancelled_at: Utc::now(),
            });
            return Ok(Some(self.finish(ctx)));
        }

        ctx.run.advance(stage)?;
        self.stage_entered(ctx);
        Ok(None)
    }

    async fn validate(&self, ctx: &mut RunContext) {
        let request = &ctx.request;
        let proposal_count = ctx.slots.len().max(1);
        let alpha = if self.settings.bonferroni_correction {
            request.significance_level / proposal_count as f64
        } else {
            request.significance_level
        };

        if !request.enable_ab_testing {
            for slot in &mut ctx.slots {
                let p = &mut slot.proposal;
                p.validation = Some(ValidationResult::untested(
                    ValidationReason::NotTested,
                    &p.baseline_samples,
                    &p.candidate_samples,
                    alpha,
                ));
                self.persist(p).await;
            }
            debug!("A/B testing disabled, proposals left untested");
            return;
        }

        let min_sample_size = request.min_sample_size;
        let timeout = self.settings.validation_timeout;
        let tests = ctx.slots.iter().map(|slot| {
            let test = self.significance_test.clone();
            let baseline = slot.proposal.baseline_samples.clone();
            let candidate = slot.proposal.candidate_samples.clone();
            async move {
                let handle = tokio::task::spawn_blocking({
                    let baseline = baseline.clone();
                    let candidate = candidate.clone();
                    move || test.test(&baseline, &candidate, alpha, min_sample_size)
                });
                match tokio::time::timeout(timeout, handle).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_err)) => {
                        warn!(error = %join_err, "Significance test aborted");
                        ValidationResult::untested(ValidationReason::NotTested, &baseline, &candidate, alpha)
                    }
                    Err(_) => ValidationResult::untested(ValidationReason::Timeout, &baseline, &candidate, alpha),
                }
            }
        });
        let results = join_all(tests).await;

        for (slot, result) in ctx.slots.iter_mut().zip(results) {
            let p = &mut slot.proposal;
            if let Err(e) = p.transition_to(ProposalStatus::Testing) {
                slot.error = Some(e.to_string());
                continue;
            }

            let transition = if result.significant {
                p.transition_to(ProposalStatus::Validated)
            } else {
                let reason = match result.reason {
                    Some(reason) => reason.as_str(),
                    None => "NOT_SIGNIFICANT",
                };
                p.reject(reason)
            };
            if let Err(e) = transition {
                slot.error = Some(e.to_string());
            }

            debug!(
                proposal_id = %p.id,
                improvement_type = %p.improvement_type,
                p_value = result.p_value,
                significant = result.significant,
                "Proposal validated"
            );
            self.publish(FeedbackLoopEvent::ProposalValidated {
                correlation_id: p.correlation_id,
                proposal_id: p.id,
                improvement_type: p.improvement_type,
                p_value: result.p_value,
                confidence: result.confidence,
                significant: result.significant,
                validated_at: Utc::now(),
            });

            let context = json!({
                "proposal_id": p.id.0,
                "correlation_id": p.correlation_id.0,
                "improvement_type": p.improvement_type.as_str(),
                "p_value": result.p_value,
                "confidence": result.confidence,
                "significant": result.significant,
            });
            if let Err(e) = self
                .lineage
                .record_event(&p.pattern_id, LineageEventType::Validated, APPLIED_BY, None, context)
                .await
            {
                debug!(error = %e, "Validation not recorded in lineage");
            }

            p.validation = Some(result);
            self.persist(p).await;
        }
    }

    /// Fold pending proposals into validated successors.
    ///
    /// A successor that failed validation leaves its predecessors awaiting
    /// review. Each predecessor is re-read so one finished by another run
    /// in the meantime is left alone.
    async fn supersede_pending(&self, ctx: &mut RunContext) {
        for slot in ctx
            .slots
            .iter_mut()
            .filter(|s| s.proposal.status == ProposalStatus::Validated && !s.supersedes.is_empty())
        {
            let mut folded = Vec::new();
            for candidate in std::mem::take(&mut slot.supersedes) {
                let mut old = match self.proposals.find_by_id(candidate.id).await {
                    Ok(Some(current)) => current,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(proposal_id = %candidate.id, error = %e, "Failed to reload pending proposal");
                        continue;
                    }
                };
                if !old.can_fold_into(&slot.proposal) {
                    continue;
                }
                if old.reject(format!("superseded by {}", slot.proposal.id)).is_ok() {
                    self.persist(&old).await;
                    folded.push(old);
                }
            }
            if folded.is_empty() {
                continue;
            }

            slot.proposal.supersede(&folded);
            info!(
                proposal_id = %slot.proposal.id,
                superseded = folded.len(),
                "Pending proposals superseded"
            );
            self.persist(&slot.proposal).await;
        }
    }

    async fn decide(&self, ctx: &mut RunContext) {
        let threshold = ctx.request.auto_apply_threshold;
        for slot in ctx.slots.iter_mut().filter(|s| !s.proposal.status.is_terminal()) {
            let p = &mut slot.proposal;
            let decision = match &p.validation {
                Some(validation) => self.gate.decide(validation, p, threshold),
                None => GateDecision::Reject,
            };
            slot.decision = Some(decision);

            if decision == GateDecision::Reject {
                if let Err(e) = p.reject("gate rejected") {
                    slot.error = Some(e.to_string());
                }
                self.persist(p).await;
            }

            metrics::counter!("feedback_loop_proposals_total", "decision" => decision.as_str()).increment(1);
            info!(proposal_id = %p.id, decision = %decision, "Gate decision");
            self.publish(FeedbackLoopEvent::ProposalDecided {
                correlation_id: p.correlation_id,
                proposal_id: p.id,
                decision,
                decided_at: Utc::now(),
            });
        }
    }

    async fn track(&self, ctx: &mut RunContext) {
        let mut failures = 0;
        for slot in ctx
            .slots
            .iter_mut()
            .filter(|s| s.decision == Some(GateDecision::ApplyAuto))
        {
            match self.apply_serialized(&mut slot.proposal).await {
                Ok((node_id, version)) => {
                    slot.tracking = TrackingStatus::Tracked;
                    slot.node_id = Some(node_id);
                    slot.version = Some(version.clone());
                    self.publish(FeedbackLoopEvent::ProposalTracked {
                        correlation_id: slot.proposal.correlation_id,
                        proposal_id: slot.proposal.id,
                        node_id,
                        version,
                        tracked_at: Utc::now(),
                    });
                }
                Err(e) => {
                    failures += 1;
                    warn!(proposal_id = %slot.proposal.id, error = %e, "Failed to track applied proposal");
                    slot.tracking = TrackingStatus::FailedToTrack;
                    slot.error = Some(e.to_string());
                    self.publish(FeedbackLoopEvent::ProposalTrackingFailed {
                        correlation_id: slot.proposal.correlation_id,
                        proposal_id: slot.proposal.id,
                        reason: e.to_string(),
                        failed_at: Utc::now(),
                    });
                }
            }
            self.persist(&slot.proposal).await;
        }
        ctx.partial_failure = failures > 0;
    }

    /// Apply under the lineage lock, retrying one transient write failure
    async fn apply_serialized(
        &self,
        proposal: &mut ImprovementProposal,
    ) -> Result<(NodeId, String), ApplyError> {
        let lineage_id = self.lineage.latest(&proposal.pattern_id).await?.lineage_id;
        let lock = self.lineage_lock(lineage_id);

        let result = {
            let _guard = lock.lock().await;
            match self.gate.apply(self.lineage.as_ref(), proposal).await {
                Err(e) if e.is_retryable() => {
                    debug!(error = %e, "Retrying lineage write");
                    tokio::time::sleep(self.settings.tracking_retry_backoff).await;
                    self.gate.apply(self.lineage.as_ref(), proposal).await
                }
                other => other,
            }
        };

        self.release_lineage_lock(lineage_id, lock);
        result.map(|applied| (applied.node.node_id, applied.version))
    }

    fn lineage_lock(&self, lineage_id: LineageId) -> Arc<Mutex<()>> {
        self.lineage_locks.entry(lineage_id).or_default().clone()
    }

    /// Drop the table entry once no other run holds or waits on the lock
    fn release_lineage_lock(&self, lineage_id: LineageId, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.lineage_locks
            .remove_if(&lineage_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn fail(
        &self,
        mut ctx: RunContext,
        message: String,
    ) -> Result<FeedbackLoopReport, FeedbackLoopError> {
        let stage = ctx.run.state;
        warn!(stage = %stage, error = %message, "Feedback loop failed");
        ctx.run.advance(LoopState::Failed)?;
        ctx.failure = Some(StageFailure {
            correlation_id: ctx.correlation_id(),
            stage,
            message: message.clone(),
        });
        self.publish(FeedbackLoopEvent::RunFailed {
            correlation_id: ctx.correlation_id(),
            stage,
            reason: message,
            failed_at: Utc::now(),
        });
        Ok(self.finish(&ctx))
    }

    fn complete(&self, mut ctx: RunContext) -> Result<FeedbackLoopReport, FeedbackLoopError> {
        ctx.run.advance(LoopState::Completed)?;
        if ctx.partial_failure {
            ctx.run.mark_stage(LoopState::Tracking, StageStatus::PartialFailure);
        }
        let report = self.finish(&ctx);
        info!(
            improvements_identified = report.improvements_identified,
            improvements_applied = report.improvements_applied,
            partial_failure = report.partial_failure,
            "Feedback loop completed"
        );
        self.publish(FeedbackLoopEvent::RunCompleted {
            correlation_id: ctx.correlation_id(),
            improvements_applied: report.improvements_applied,
            partial_failure: report.partial_failure,
            completed_at: report.completed_at,
        });
        Ok(report)
    }

    fn finish(&self, ctx: &RunContext) -> FeedbackLoopReport {
        let count = |f: &dyn Fn(&ProposalSlot) -> bool| ctx.slots.iter().filter(|s| f(s)).count();

        let applied: Vec<&ProposalSlot> = ctx
            .slots
            .iter()
            .filter(|s| s.tracking == TrackingStatus::Tracked)
            .collect();
        let performance_delta = applied
            .iter()
            .filter_map(|s| s.proposal.validation.as_ref())
            .map(|v| v.relative_effect)
            .max_by(|a, b| a.abs().total_cmp(&b.abs()));

        let strongest = ctx
            .slots
            .iter()
            .filter_map(|s| s.proposal.validation.as_ref())
            .filter(|v| v.is_tested())
            .min_by(|a, b| a.p_value.total_cmp(&b.p_value));

        let report = FeedbackLoopReport {
            correlation_id: ctx.correlation_id(),
            pattern_id: ctx.request.pattern_id.clone(),
            success: ctx.run.state == LoopState::Completed,
            final_state: ctx.run.state,
            feedback_collected: ctx.feedback_collected,
            improvements_identified: ctx.slots.len(),
            improvements_validated: count(&|s| {
                s.proposal.validation.as_ref().map_or(false, |v| v.significant)
            }),
            improvements_applied: applied.len(),
            improvements_pending_review: count(&|s| {
                s.decision == Some(GateDecision::ApplyManualReview)
            }),
            improvements_rejected: count(&|s| s.proposal.status == ProposalStatus::Rejected),
            performance_delta,
            confidence_score: strongest.map(|v| v.confidence),
            p_value: strongest.map(|v| v.p_value),
            statistically_significant: ctx
                .slots
                .iter()
                .any(|s| s.proposal.validation.as_ref().map_or(false, |v| v.significant)),
            stage_statuses: ctx.run.stage_statuses.clone(),
            partial_failure: ctx.partial_failure,
            outcomes: ctx.slots.iter().map(ProposalSlot::outcome).collect(),
            failure: ctx.failure.clone(),
            started_at: ctx.run.started_at,
            completed_at: Utc::now(),
        };

        metrics::counter!("feedback_loop_runs_total", "outcome" => report.final_state.as_str()).increment(1);
        metrics::histogram!("feedback_loop_run_duration_seconds").record(ctx.started.elapsed().as_secs_f64());

        report
    }

    fn stage_entered(&self, ctx: &RunContext) {
        debug!(stage = %ctx.run.state, "Stage entered");
        self.publish(FeedbackLoopEvent::StageEntered {
            correlation_id: ctx.correlation_id(),
            stage: ctx.run.state,
            entered_at: Utc::now(),
        });
    }

    async fn persist(&self, proposal: &ImprovementProposal) {
        if let Err(e) = self.proposals.save(proposal).await {
            warn!(proposal_id = %proposal.id, error = %e, "Failed to persist proposal");
        }
    }

    fn publish(&self, event: FeedbackLoopEvent) {
        self.event_bus.publish_feedback_loop_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::InMemoryProposalRepository;
    use crate::infrastructure::trace_store::{InMemoryTraceStore, TraceStoreFeedbackCollector};
    use pattern_lineage::{InMemoryLineageRepository, StandardLineageService};

    fn use_case() -> StandardFeedbackLoopUseCase {
        StandardFeedbackLoopUseCase::new(
            Arc::new(TraceStoreFeedbackCollector::new(Arc::new(InMemoryTraceStore::new()))),
            Arc::new(StandardLineageService::with_repository(Arc::new(
                InMemoryLineageRepository::new(),
            ))),
            Arc::new(InMemoryProposalRepository::new()),
            Arc::new(EventBus::with_default_capacity()),
            &LineageConfigSpec::default(),
        )
    }

    #[test]
    fn test_lineage_lock_entry_removed_after_last_holder() {
        let uc = use_case();
        let lineage_id = LineageId::new();

        let first = uc.lineage_lock(lineage_id);
        let second = uc.lineage_lock(lineage_id);
        assert!(Arc::ptr_eq(&first, &second));

        uc.release_lineage_lock(lineage_id, first);
        assert_eq!(uc.lineage_locks.len(), 1);

        uc.release_lineage_lock(lineage_id, second);
        assert!(uc.lineage_locks.is_empty());
    }
}
