// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Proposal Repository
//!
//! `ProposalRepository` backed by the `improvement_proposals` table. The full
//! proposal (sample arms and validation included) is stored as JSONB; the
//! columns used for lookup are duplicated alongside it.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::feedback_loop::CorrelationId;
use crate::domain::proposal::{ImprovementProposal, ProposalId};
use crate::domain::repository::{ProposalRepository, RepositoryError};

pub struct PostgresProposalRepository {
    pool: PgPool,
}

impl PostgresProposalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: &PgRow) -> Result<ImprovementProposal, RepositoryError> {
        let body: serde_json::Value = row.get("body");
        serde_json::from_value(body).map_err(|e| {
            RepositoryError::Serialization(format!("Failed to deserialize proposal: {}", e))
        })
    }
}

#[async_trait]
impl ProposalRepository for PostgresProposalRepository {
    async fn save(&self, proposal: &ImprovementProposal) -> Result<(), RepositoryError> {
        let body = serde_json::to_value(proposal)?;
        let decision_confidence = proposal.validation.as_ref().map(|v| v.confidence);

        sqlx::query(
            r#"
            INSERT INTO improvement_proposals (
                id, pattern_id, correlation_id, improvement_type, status,
                confidence, body, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                confidence = EXCLUDED.confidence,
                body = EXCLUDED.body,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(proposal.id.0)
        .bind(&proposal.pattern_id)
        .bind(proposal.correlation_id.0)
        .bind(proposal.improvement_type.as_str())
        .bind(proposal.status.as_str())
        .bind(decision_confidence)
        .bind(body)
        .bind(proposal.created_at)
        .bind(proposal.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save proposal: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: ProposalId) -> Result<Option<ImprovementProposal>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT body
            FROM improvement_proposals
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn find_by_pattern(&self, pattern_id: &str) -> Result<Vec<ImprovementProposal>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT body
            FROM improvement_proposals
            WHERE pattern_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(pattern_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn find_by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Vec<ImprovementProposal>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT body
            FROM improvement_proposals
            WHERE correlation_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(correlation_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }
}
