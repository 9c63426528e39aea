// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-process service wiring
//!
//! Creates the lineage and feedback loop services for a single CLI
//! invocation from the loaded configuration.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use lineage_orchestrator::{
    application::{
        feedback_loop::StandardFeedbackLoopUseCase,
        repository_factory::{
            create_lineage_repository, create_lineage_service, create_proposal_repository,
        },
        tracking_service::StandardTrackingService,
    },
    domain::{
        feedback::ExecutionTraceStore, lineage_config::LineageConfigManifest,
        repository::StorageBackend,
    },
    infrastructure::{
        db::Database,
        event_bus::EventBus,
        trace_store::{InMemoryTraceStore, JsonFileTraceStore, TraceStoreFeedbackCollector},
    },
};

/// Actor recorded on lineage events written from the command line
pub const CLI_ACTOR: &str = "lineage-cli";

pub struct LineageRuntime {
    pub config: LineageConfigManifest,
    pub tracking: StandardTrackingService,
    pub event_bus: Arc<EventBus>,
}

impl LineageRuntime {
    /// Load configuration and build services. `traces` feeds the feedback
    /// collector; without it every run sees an empty execution history.
    pub async fn new(config_path: Option<PathBuf>, traces: Option<&Path>) -> Result<Self> {
        let config = LineageConfigManifest::load_or_default(config_path)
            .context("Failed to load configuration")?;
        config.validate().context("Configuration validation failed")?;
        Self::from_config(config, traces).await
    }

    pub async fn from_config(config: LineageConfigManifest, traces: Option<&Path>) -> Result<Self> {
        let backend = config
            .spec
            .storage
            .backend()
            .context("Invalid storage configuration")?;

        let pool = match &backend {
            StorageBackend::InMemory => {
                warn!("Using in_memory storage; lineage written by this command is discarded on exit");
                None
            }
            StorageBackend::PostgreSQL(pg) => {
                let db = Database::new(&pg.connection_string).await?;
                info!("Connected to PostgreSQL");
                Some(db.get_pool().clone())
            }
        };

        let lineage = create_lineage_service(create_lineage_repository(&backend, pool.clone())?);
        let proposals = create_proposal_repository(&backend, pool)?;

        let store: Arc<dyn ExecutionTraceStore> = match traces {
            Some(path) => Arc::new(JsonFileTraceStore::new(path)),
            None => Arc::new(InMemoryTraceStore::new()),
        };
        let collector = Arc::new(TraceStoreFeedbackCollector::new(store));

        let event_bus = Arc::new(EventBus::with_default_capacity());
        let feedback_loop = Arc::new(StandardFeedbackLoopUseCase::new(
            collector,
            lineage.clone(),
            proposals,
            event_bus.clone(),
            &config.spec,
        ));
        let tracking = StandardTrackingService::new(lineage, feedback_loop, event_bus.clone())
            .with_actor(CLI_ACTOR);

        Ok(Self {
            config,
            tracking,
            event_bus,
        })
    }
}
