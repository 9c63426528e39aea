// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tracking Service
//!
//! Outward-facing operations of the pattern lineage system: recording pattern
//! versions, querying their history and running the feedback loop. Lineage
//! writes go through [`LineageService`]; every resulting lineage event is
//! republished on the [`EventBus`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pattern_lineage::{
    AncestryView, CreateNodeRequest, Descendant, EdgeType, EventId, LineageError, LineageEvent,
    LineageEventType, LineageId, LineageService, NodeId, ParentRef, PatternNode,
    TransformationType,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::application::feedback_loop::FeedbackLoopUseCase;
use crate::domain::feedback_loop::{FeedbackLoopError, FeedbackLoopReport, FeedbackLoopRequest};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone)]
pub struct TrackCreation {
    pub pattern_id: String,
    pub name: String,
    pub pattern_type: String,
    pub version: String,
    pub payload: Value,
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreationTracked {
    pub lineage_id: LineageId,
    pub node_id: NodeId,
    pub event_id: EventId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TrackModification {
    pub pattern_id: String,
    pub version: String,
    pub payload: Value,
    pub parents: Vec<ParentRef>,
    pub edge_type: EdgeType,
    pub transformation_type: TransformationType,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModificationTracked {
    pub node_id: NodeId,
    pub parent_node_ids: Vec<NodeId>,
    pub generation: u32,
}

#[derive(Debug, Clone)]
pub struct TrackMerge {
    pub pattern_id: String,
    pub version: String,
    pub payload: Value,
    pub parents: Vec<ParentRef>,
    pub transformation_type: TransformationType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeTracked {
    pub node_id: NodeId,
    pub parent_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationTracked {
    pub event_id: EventId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeprecationTracked {
    pub event_id: EventId,
    pub deprecated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AncestryReport {
    pub pattern_id: String,
    pub ancestors: Vec<PatternNode>,
    pub ancestry_depth: u32,
    pub total_ancestors: usize,
    pub lineage_id: LineageId,
}

impl From<AncestryView> for AncestryReport {
    fn from(view: AncestryView) -> Self {
        Self {
            pattern_id: view.node.pattern_id,
            ancestors: view.ancestors,
            ancestry_depth: view.ancestry_depth,
            total_ancestors: view.total_ancestors,
            lineage_id: view.lineage_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescendantsReport {
    pub pattern_id: String,
    pub descendants: Vec<Descendant>,
    pub total_descendants: usize,
}

#[async_trait]
pub trait TrackingService: Send + Sync {
    async fn track_creation(&self, request: TrackCreation) -> Result<CreationTracked, LineageError>;

    async fn track_modification(&self, request: TrackModification) -> Result<ModificationTracked, LineageError>;

    /// Requires at least two distinct parents
    async fn track_merge(&self, request: TrackMerge) -> Result<MergeTracked, LineageError>;

    /// Record that the pattern's latest version was used in an execution
    async fn track_application(
        &self,
        pattern_id: &str,
        execution_context: Value,
        metadata: HashMap<String, Value>,
    ) -> Result<ApplicationTracked, LineageError>;

    async fn track_deprecation(&self, pattern_id: &str, reason: &str) -> Result<DeprecationTracked, LineageError>;

    async fn query_ancestry(&self, pattern_id: &str) -> Result<AncestryReport, LineageError>;

    async fn query_descendants(&self, pattern_id: &str) -> Result<DescendantsReport, LineageError>;

    async fn query_events(&self, pattern_id: &str) -> Result<Vec<LineageEvent>, LineageError>;

    async fn run_feedback_loop(
        &self,
        request: FeedbackLoopRequest,
        cancel: CancellationToken,
    ) -> Result<FeedbackLoopReport, FeedbackLoopError>;
}

pub struct StandardTrackingService {
    lineage: Arc<dyn LineageService>,
    feedback_loop: Arc<dyn FeedbackLoopUseCase>,
    event_bus: Arc<EventBus>,
    actor: String,
}

impl StandardTrackingService {
    pub fn new(
        lineage: Arc<dyn LineageService>,
        feedback_loop: Arc<dyn FeedbackLoopUseCase>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            lineage,
            feedback_loop,
            event_bus,
            actor: "user".to_string(),
        }
    }

    /// Name recorded as `triggered_by` on lineage events
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }
}

#[async_trait]
impl TrackingService for StandardTrackingService {
    async fn track_creation(&self, request: TrackCreation) -> Result<CreationTracked, LineageError> {
        let node_request = CreateNodeRequest::root(request.pattern_id, request.version, request.payload)
            .with_name(request.name)
            .with_type(request.pattern_type)
            .with_metadata(request.metadata)
            .triggered_by(self.actor.clone());

        let created = self.lineage.create_node(node_request).await?;
        self.event_bus.publish_lineage_event(created.event.clone());

        Ok(CreationTracked {
            lineage_id: created.lineage_id,
            node_id: created.node_id,
            event_id: created.event.id,
            created_at: created.created_at,
        })
    }

    async fn track_modification(&self, request: TrackModification) -> Result<ModificationTracked, LineageError> {
        if request.parents.is_empty() {
            return Err(LineageError::InvalidInput(
                "a modification needs at least one parent".to_string(),
            ));
        }

        let parent = self.lineage.latest(&request.pattern_id).await.ok();
        let mut node_request = CreateNodeRequest::derived(
            request.pattern_id,
            request.version,
            request.payload,
            request.parents,
            request.edge_type,
            request.transformation_type,
        )
        .triggered_by(self.actor.clone());
        if let Some(parent) = parent {
            node_request = node_request
                .with_name(parent.name)
                .with_type(parent.pattern_type);
        }
        if let Some(reason) = request.reason {
            node_request = node_request.with_reason(reason);
        }

        let created = self.lineage.create_node(node_request).await?;
        self.event_bus.publish_lineage_event(created.event.clone());

        Ok(ModificationTracked {
            node_id: created.node_id,
            parent_node_ids: created.parent_node_ids,
            generation: created.generation,
        })
    }

    async fn track_merge(&self, request: TrackMerge) -> Result<MergeTracked, LineageError> {
        // A node id and a pattern id can name the same version
        let mut parents: Vec<NodeId> = Vec::with_capacity(request.parents.len());
        for parent in &request.parents {
            let id = match parent {
                ParentRef::Node(id) => *id,
                ParentRef::Pattern(pattern_id) => self.lineage.latest(pattern_id).await?.id,
            };
            if !parents.contains(&id) {
                parents.push(id);
            }
        }
        if parents.len() < 2 {
            return Err(LineageError::InvalidInput(
                "a merge needs at least two distinct parents".to_string(),
            ));
        }

        let node_request = CreateNodeRequest::derived(
            request.pattern_id,
            request.version,
            request.payload,
            parents.into_iter().map(ParentRef::Node).collect(),
            EdgeType::MergedFrom,
            request.transformation_type,
        )
        .triggered_by(self.actor.clone());

        let created = self.lineage.create_node(node_request).await?;
        self.event_bus.publish_lineage_event(created.event.clone());

        Ok(MergeTracked {
            node_id: created.node_id,
            parent_count: created.parent_node_ids.len(),
        })
    }

    async fn track_application(
        &self,
        pattern_id: &str,
        execution_context: Value,
        metadata: HashMap<String, Value>,
    ) -> Result<ApplicationTracked, LineageError> {
        let context = serde_json::json!({
            "execution_context": execution_context,
            "metadata": metadata,
        });
        let event = self
            .lineage
            .record_event(pattern_id, LineageEventType::Applied, &self.actor, None, context)
            .await?;
        let event_id = event.id;
        self.event_bus.publish_lineage_event(event);
        Ok(ApplicationTracked { event_id })
    }

    async fn track_deprecation(&self, pattern_id: &str, reason: &str) -> Result<DeprecationTracked, LineageError> {
        let event = self.lineage.deprecate(pattern_id, reason, &self.actor).await?;
        let event_id = event.id;
        self.event_bus.publish_lineage_event(event);
        Ok(DeprecationTracked {
            event_id,
            deprecated: true,
        })
    }

    async fn query_ancestry(&self, pattern_id: &str) -> Result<AncestryReport, LineageError> {
        Ok(self.lineage.query_ancestry(pattern_id).await?.into())
    }

    async fn query_descendants(&self, pattern_id: &str) -> Result<DescendantsReport, LineageError> {
        let view = self.lineage.query_descendants(pattern_id).await?;
        Ok(DescendantsReport {
            pattern_id: view.node.pattern_id,
            descendants: view.descendants,
            total_descendants: view.total_descendants,
        })
    }

    async fn query_events(&self, pattern_id: &str) -> Result<Vec<LineageEvent>, LineageError> {
        self.lineage.events_for_pattern(pattern_id).await
    }

    async fn run_feedback_loop(
        &self,
        request: FeedbackLoopRequest,
        cancel: CancellationToken,
    ) -> Result<FeedbackLoopReport, FeedbackLoopError> {
        self.feedback_loop.run(request, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::feedback_loop::StandardFeedbackLoopUseCase;
    use crate::application::repository_factory::{create_lineage_repository, create_lineage_service};
    use crate::domain::lineage_config::LineageConfigSpec;
    use crate::domain::repository::StorageBackend;
    use crate::infrastructure::event_bus::DomainEvent;
    use crate::infrastructure::repositories::InMemoryProposalRepository;
    use crate::infrastructure::trace_store::{InMemoryTraceStore, TraceStoreFeedbackCollector};
    use serde_json::json;

    fn service() -> (StandardTrackingService, Arc<EventBus>) {
        let repository = create_lineage_repository(&StorageBackend::InMemory, None).unwrap();
        let lineage = create_lineage_service(repository);
        let event_bus = Arc::new(EventBus::with_default_capacity());
        let collector = Arc::new(TraceStoreFeedbackCollector::new(Arc::new(InMemoryTraceStore::new())));
        let feedback_loop = Arc::new(StandardFeedbackLoopUseCase::new(
            collector,
            lineage.clone(),
            Arc::new(InMemoryProposalRepository::new()),
            event_bus.clone(),
            &LineageConfigSpec::default(),
        ));
        let tracking = StandardTrackingService::new(lineage, feedback_loop, event_bus.clone()).with_actor("tester");
        (tracking, event_bus)
    }

    fn creation(pattern_id: &str) -> TrackCreation {
        TrackCreation {
            pattern_id: pattern_id.to_string(),
            name: pattern_id.replace('_', " "),
            pattern_type: "prompt".to_string(),
            version: "1.0".to_string(),
            payload: json!({"template": pattern_id}),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_creation_republishes_lineage_event() {
        let (tracking, event_bus) = service();
        let mut receiver = event_bus.subscribe();

        let created = tracking.track_creation(creation("summarizer")).await.unwrap();

        match receiver.recv().await.unwrap() {
            DomainEvent::Lineage(event) => {
                assert_eq!(event.id, created.event_id);
                assert_eq!(event.event_type, LineageEventType::Created);
                assert_eq!(event.pattern_node_id, created.node_id);
                assert_eq!(event.triggered_by, "tester");
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_modification_extends_lineage() {
        let (tracking, _bus) = service();
        let root = tracking.track_creation(creation("summarizer")).await.unwrap();

        let modified = tracking
            .track_modification(TrackModification {
                pattern_id: "summarizer".to_string(),
                version: "1.1".to_string(),
                payload: json!({"template": "shorter"}),
                parents: vec![ParentRef::Node(root.node_id)],
                edge_type: EdgeType::ModifiedFrom,
                transformation_type: TransformationType::Refactor,
                reason: Some("tighter prompt".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(modified.generation, 1);
        assert_eq!(modified.parent_node_ids, vec![root.node_id]);

        let ancestry = tracking.query_ancestry("summarizer").await.unwrap();
        assert_eq!(ancestry.total_ancestors, 1);
        assert_eq!(ancestry.lineage_id, root.lineage_id);

        let descendants = tracking.query_descendants("summarizer").await.unwrap();
        assert_eq!(descendants.total_descendants, 0);
    }

    #[tokio::test]
    async fn test_modification_without_parents_is_rejected() {
        let (tracking, _bus) = service();
        tracking.track_creation(creation("summarizer")).await.unwrap();

        let err = tracking
            .track_modification(TrackModification {
                pattern_id: "summarizer".to_string(),
                version: "1.1".to_string(),
                payload: json!({}),
                parents: vec![],
                edge_type: EdgeType::ModifiedFrom,
                transformation_type: TransformationType::Refactor,
                reason: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LineageError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_merge_needs_two_distinct_parents() {
        let (tracking, event_bus) = service();
        let summarizer = tracking.track_creation(creation("summarizer")).await.unwrap();
        tracking.track_creation(creation("translator")).await.unwrap();

        let same_version = tracking
            .track_merge(TrackMerge {
                pattern_id: "combined".to_string(),
                version: "1.0".to_string(),
                payload: json!({}),
                parents: vec![ParentRef::Node(summarizer.node_id), "summarizer".into()],
                transformation_type: TransformationType::Merge,
            })
            .await
            .unwrap_err();
        assert!(matches!(same_version, LineageError::InvalidInput(_)));
        assert!(matches!(
            tracking.query_ancestry("combined").await,
            Err(LineageError::NotFound(_))
        ));

        let duplicate = tracking
            .track_merge(TrackMerge {
                pattern_id: "combined".to_string(),
                version: "1.0".to_string(),
                payload: json!({}),
                parents: vec!["summarizer".into(), "summarizer".into()],
                transformation_type: TransformationType::Merge,
            })
            .await
            .unwrap_err();
        assert!(matches!(duplicate, LineageError::InvalidInput(_)));

        let mut receiver = event_bus.subscribe();
        let merged = tracking
            .track_merge(TrackMerge {
                pattern_id: "combined".to_string(),
                version: "1.0".to_string(),
                payload: json!({}),
                parents: vec!["summarizer".into(), "translator".into()],
                transformation_type: TransformationType::Merge,
            })
            .await
            .unwrap();
        assert_eq!(merged.parent_count, 2);

        match receiver.recv().await.unwrap() {
            DomainEvent::Lineage(event) => assert_eq!(event.event_type, LineageEventType::Merged),
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_application_and_deprecation_are_audited() {
        let (tracking, _bus) = service();
        tracking.track_creation(creation("summarizer")).await.unwrap();

        tracking
            .track_application("summarizer", json!({"execution_id": "exec-1"}), HashMap::new())
            .await
            .unwrap();
        let deprecation = tracking
            .track_deprecation("summarizer", "superseded by translator")
            .await
            .unwrap();
        assert!(deprecation.deprecated);

        let events = tracking.query_events("summarizer").await.unwrap();
        let types: Vec<LineageEventType> = events.iter().map(|e| e.event_type).collect();
        assert!(types.contains(&LineageEventType::Created));
        assert!(types.contains(&LineageEventType::Applied));
        assert!(types.contains(&LineageEventType::Deprecated));
    }

    #[tokio::test]
    async fn test_unknown_pattern_is_not_found() {
        let (tracking, _bus) = service();
        let err = tracking.query_ancestry("missing").await.unwrap_err();
        assert!(matches!(err, LineageError::NotFound(_)));
    }
}
