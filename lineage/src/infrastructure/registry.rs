// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pattern registry backed by the lineage repository itself

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{LineageError, PatternNode};
use crate::infrastructure::repository::{LineageRepository, PatternRegistry};

/// Resolves a pattern's latest version from stored lineage nodes
pub struct RepositoryPatternRegistry {
    repository: Arc<dyn LineageRepository>,
}

impl RepositoryPatternRegistry {
    pub fn new(repository: Arc<dyn LineageRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl PatternRegistry for RepositoryPatternRegistry {
    async fn latest_version(&self, pattern_id: &str) -> Result<Option<PatternNode>, LineageError> {
        self.repository.find_latest(pattern_id).await
    }
}
