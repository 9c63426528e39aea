// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete lineage and proposal repositories from the configured
//! storage backend. The domain layer only sees the repository traits.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Selects in-memory or PostgreSQL persistence at startup

use anyhow::{anyhow, Result};
use pattern_lineage::{
    InMemoryLineageRepository, LineageRepository, LineageService, PostgresLineageRepository,
    StandardLineageService,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::repository::{ProposalRepository, StorageBackend};
use crate::infrastructure::repositories::{InMemoryProposalRepository, PostgresProposalRepository};

fn require_pool(pool: Option<PgPool>) -> Result<PgPool> {
    pool.ok_or_else(|| anyhow!("PostgreSQL backend requires a connection pool"))
}

/// Creates a LineageRepository implementation based on the configured backend
pub fn create_lineage_repository(
    backend: &StorageBackend,
    pool: Option<PgPool>,
) -> Result<Arc<dyn LineageRepository>> {
    match backend {
        StorageBackend::InMemory => Ok(Arc::new(InMemoryLineageRepository::new())),
        StorageBackend::PostgreSQL(_) => Ok(Arc::new(PostgresLineageRepository::new(
            require_pool(pool)?,
        ))),
    }
}

/// Creates a ProposalRepository implementation based on the configured backend
pub fn create_proposal_repository(
    backend: &StorageBackend,
    pool: Option<PgPool>,
) -> Result<Arc<dyn ProposalRepository>> {
    match backend {
        StorageBackend::InMemory => Ok(Arc::new(InMemoryProposalRepository::new())),
        StorageBackend::PostgreSQL(_) => Ok(Arc::new(PostgresProposalRepository::new(
            require_pool(pool)?,
        ))),
    }
}

/// Lineage service whose pattern registry reads from the same repository
pub fn create_lineage_service(repository: Arc<dyn LineageRepository>) -> Arc<dyn LineageService> {
    Arc::new(StandardLineageService::with_repository(repository))
}
