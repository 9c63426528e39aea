// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Lineage tracking through the outward-facing tracking service

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use lineage_orchestrator::application::feedback_loop::StandardFeedbackLoopUseCase;
use lineage_orchestrator::application::repository_factory::{
    create_lineage_repository, create_lineage_service, create_proposal_repository,
};
use lineage_orchestrator::application::tracking_service::{
    StandardTrackingService, TrackCreation, TrackMerge, TrackModification, TrackingService,
};
use lineage_orchestrator::domain::feedback_loop::LoopState;
use lineage_orchestrator::domain::lineage_config::LineageConfigSpec;
use lineage_orchestrator::domain::repository::StorageBackend;
use lineage_orchestrator::infrastructure::event_bus::EventBus;
use lineage_orchestrator::infrastructure::trace_store::{
    InMemoryTraceStore, TraceStoreFeedbackCollector,
};
use pattern_lineage::{EdgeType, LineageEventType, NodeId, ParentRef, TransformationType};

fn tracking_service() -> StandardTrackingService {
    let backend = StorageBackend::InMemory;
    let lineage = create_lineage_service(create_lineage_repository(&backend, None).unwrap());
    let proposals = create_proposal_repository(&backend, None).unwrap();
    let event_bus = Arc::new(EventBus::with_default_capacity());
    let collector = Arc::new(TraceStoreFeedbackCollector::new(Arc::new(InMemoryTraceStore::new())));
    let feedback_loop = Arc::new(StandardFeedbackLoopUseCase::new(
        collector,
        lineage.clone(),
        proposals,
        event_bus.clone(),
        &LineageConfigSpec::default(),
    ));
    StandardTrackingService::new(lineage, feedback_loop, event_bus)
}

fn creation(pattern_id: &str, version: &str) -> TrackCreation {
    TrackCreation {
        pattern_id: pattern_id.to_string(),
        name: pattern_id.to_string(),
        pattern_type: "io".to_string(),
        version: version.to_string(),
        payload: json!({"pattern": pattern_id}),
        metadata: HashMap::new(),
    }
}

fn modification(pattern_id: &str, version: &str, parent: NodeId) -> TrackModification {
    TrackModification {
        pattern_id: pattern_id.to_string(),
        version: version.to_string(),
        payload: json!({"pattern": pattern_id, "version": version}),
        parents: vec![ParentRef::Node(parent)],
        edge_type: EdgeType::ModifiedFrom,
        transformation_type: TransformationType::Enhancement,
        reason: None,
    }
}

#[tokio::test]
async fn test_linear_history_ancestry() {
    let tracking = tracking_service();
    let v1 = tracking.track_creation(creation("buffered_writer", "v1")).await.unwrap();
    let v2 = tracking
        .track_modification(modification("buffered_writer", "v2", v1.node_id))
        .await
        .unwrap();
    let v3 = tracking
        .track_modification(modification("buffered_writer", "v3", v2.node_id))
        .await
        .unwrap();
    assert_eq!(v3.generation, 2);

    let ancestry = tracking.query_ancestry("buffered_writer").await.unwrap();
    let versions: Vec<&str> = ancestry.ancestors.iter().map(|n| n.version.as_str()).collect();
    assert_eq!(versions, vec!["v1", "v2"]);
    assert_eq!(ancestry.ancestry_depth, 2);
    assert_eq!(ancestry.total_ancestors, 2);
    assert_eq!(ancestry.lineage_id, v1.lineage_id);

    // Served from the cache on the second read
    let again = tracking.query_ancestry("buffered_writer").await.unwrap();
    assert_eq!(
        again.ancestors.iter().map(|n| n.id).collect::<Vec<_>>(),
        ancestry.ancestors.iter().map(|n| n.id).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_merge_is_the_only_descendant_of_each_parent() {
    let tracking = tracking_service();
    tracking.track_creation(creation("async_writer", "1.0")).await.unwrap();
    tracking.track_creation(creation("sync_writer", "1.0")).await.unwrap();

    let merged = tracking
        .track_merge(TrackMerge {
            pattern_id: "unified_writer".to_string(),
            version: "1.0".to_string(),
            payload: json!({"mode": "either"}),
            parents: vec!["async_writer".into(), "sync_writer".into()],
            transformation_type: TransformationType::Merge,
        })
        .await
        .unwrap();
    assert_eq!(merged.parent_count, 2);

    for parent in ["async_writer", "sync_writer"] {
        let descendants = tracking.query_descendants(parent).await.unwrap();
        assert_eq!(descendants.total_descendants, 1);
        let child = &descendants.descendants[0];
        assert_eq!(child.node.pattern_id, "unified_writer");
        assert_eq!(child.node.id, merged.node_id);
        assert_eq!(child.edge_type, EdgeType::MergedFrom);
    }

    let ancestry = tracking.query_ancestry("unified_writer").await.unwrap();
    assert_eq!(ancestry.total_ancestors, 2);
    assert_eq!(ancestry.ancestry_depth, 1);
}

#[tokio::test]
async fn test_deprecation_keeps_descendants() {
    let tracking = tracking_service();
    let base = tracking.track_creation(creation("base_parser", "1.0")).await.unwrap();

    for child in ["json_parser", "yaml_parser"] {
        tracking
            .track_modification(TrackModification {
                pattern_id: child.to_string(),
                version: "1.0".to_string(),
                payload: json!({"format": child}),
                parents: vec![ParentRef::Node(base.node_id)],
                edge_type: EdgeType::DerivedFrom,
                transformation_type: TransformationType::Refactor,
                reason: Some("specialised".to_string()),
            })
            .await
            .unwrap();
    }

    let before = tracking.query_descendants("base_parser").await.unwrap();
    assert_eq!(before.total_descendants, 2);

    let deprecation = tracking
        .track_deprecation("base_parser", "replaced by format-specific parsers")
        .await
        .unwrap();
    assert!(deprecation.deprecated);

    let after = tracking.query_descendants("base_parser").await.unwrap();
    assert_eq!(after.total_descendants, 2);
    let mut before_ids: Vec<NodeId> = before.descendants.iter().map(|d| d.node.id).collect();
    let mut after_ids: Vec<NodeId> = after.descendants.iter().map(|d| d.node.id).collect();
    before_ids.sort();
    after_ids.sort();
    assert_eq!(before_ids, after_ids);

    let events = tracking.query_events("base_parser").await.unwrap();
    assert_eq!(events.last().map(|e| e.event_type), Some(LineageEventType::Deprecated));
}

#[tokio::test]
async fn test_loop_over_empty_history_completes() {
    let tracking = tracking_service();
    tracking.track_creation(creation("idle_pattern", "1.0")).await.unwrap();

    let request = LineageConfigSpec::default().feedback_loop.request_for("idle_pattern");
    let report = tracking
        .run_feedback_loop(request, CancellationToken::new())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.final_state, LoopState::Completed);
    assert_eq!(report.feedback_collected, 0);
    assert_eq!(report.improvements_identified, 0);
}
