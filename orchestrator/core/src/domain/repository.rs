// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Proposal Repository
//!
//! Every proposal the analyzer emits is retained for audit, including the
//! rejected ones. The interface lives here; implementations live in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `ProposalRepository` | `ImprovementProposal` | `InMemoryProposalRepository`, `PostgresProposalRepository` |
//!
//! Lineage persistence is owned by the `pattern_lineage` crate.

use async_trait::async_trait;

use crate::domain::feedback_loop::CorrelationId;
use crate::domain::proposal::{ImprovementProposal, ProposalId};

/// Storage backend selected from configuration
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
}

#[async_trait]
pub trait ProposalRepository: Send + Sync {
    /// Save proposal (create or update)
    async fn save(&self, proposal: &ImprovementProposal) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: ProposalId) -> Result<Option<ImprovementProposal>, RepositoryError>;

    /// Proposals for a pattern, oldest first
    async fn find_by_pattern(&self, pattern_id: &str) -> Result<Vec<ImprovementProposal>, RepositoryError>;

    /// Proposals produced by one feedback loop run
    async fn find_by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Vec<ImprovementProposal>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
