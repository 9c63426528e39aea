// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of [`ProposalRepository`].
//!
//! - **InMemoryProposalRepository**: process-local, used by tests and offline CLI runs
//! - **PostgresProposalRepository**: the `improvement_proposals` audit table

pub mod postgres_proposal;

pub use postgres_proposal::PostgresProposalRepository;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::feedback_loop::CorrelationId;
use crate::domain::proposal::{ImprovementProposal, ProposalId};
use crate::domain::repository::{ProposalRepository, RepositoryError};

#[derive(Clone, Default)]
pub struct InMemoryProposalRepository {
    proposals: Arc<RwLock<HashMap<ProposalId, ImprovementProposal>>>,
}

impl InMemoryProposalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut proposals: Vec<ImprovementProposal>) -> Vec<ImprovementProposal> {
        proposals.sort_by_key(|p| (p.created_at, p.id.0));
        proposals
    }
}

#[async_trait]
impl ProposalRepository for InMemoryProposalRepository {
    async fn save(&self, proposal: &ImprovementProposal) -> Result<(), RepositoryError> {
        self.proposals.write().await.insert(proposal.id, proposal.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ProposalId) -> Result<Option<ImprovementProposal>, RepositoryError> {
        Ok(self.proposals.read().await.get(&id).cloned())
    }

    async fn find_by_pattern(&self, pattern_id: &str) -> Result<Vec<ImprovementProposal>, RepositoryError> {
        let proposals = self.proposals.read().await;
        Ok(Self::sorted(
            proposals
                .values()
                .filter(|p| p.pattern_id == pattern_id)
                .cloned()
                .collect(),
        ))
    }

    async fn find_by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Vec<ImprovementProposal>, RepositoryError> {
        let proposals = self.proposals.read().await;
        Ok(Self::sorted(
            proposals
                .values()
                .filter(|p| p.correlation_id == correlation_id)
                .cloned()
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::proposal::{ImprovementDirection, ImprovementType, ProposalDraft, ProposalStatus};

    fn proposal(pattern_id: &str, correlation_id: CorrelationId) -> ImprovementProposal {
        ImprovementProposal::from_draft(
            ProposalDraft {
                improvement_type: ImprovementType::Reliability,
                direction: ImprovementDirection::Regression,
                baseline_value: 0.0,
                candidate_value: 0.5,
                target_value: 0.0,
                evidence_count: 60,
                baseline_samples: vec![0.0; 30],
                candidate_samples: vec![1.0; 30],
            },
            pattern_id,
            correlation_id,
        )
    }

    #[tokio::test]
    async fn test_save_overwrites_and_queries_filter() {
        let repo = InMemoryProposalRepository::new();
        let run = CorrelationId::new();
        let mut a = proposal("writer", run);
        let b = proposal("reader", run);
        let c = proposal("writer", CorrelationId::new());

        repo.save(&a).await.unwrap();
        repo.save(&b).await.unwrap();
        repo.save(&c).await.unwrap();

        a.reject("not significant").unwrap();
        repo.save(&a).await.unwrap();

        let stored = repo.find_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ProposalStatus::Rejected);

        assert_eq!(repo.find_by_pattern("writer").await.unwrap().len(), 2);
        let by_run: Vec<_> = repo
            .find_by_correlation(run)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.pattern_id)
            .collect();
        assert_eq!(by_run.len(), 2);
        assert!(by_run.contains(&"reader".to_string()));
        assert!(repo.find_by_id(ProposalId::new()).await.unwrap().is_none());
    }
}
