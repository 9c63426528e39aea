// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for the Lineage Store bounded context

pub mod graph_store;
pub mod postgres_repository;
pub mod registry;
pub mod repository;

pub use graph_store::InMemoryLineageRepository;
pub use postgres_repository::PostgresLineageRepository;
pub use registry::RepositoryPatternRegistry;
pub use repository::{LineageRepository, NodeWrite, PatternRegistry};
