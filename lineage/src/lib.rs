// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Pattern Lineage
//!
//! Append-only storage of pattern versions as a directed acyclic graph, with
//! a materialized ancestry cache for fast traversal queries.
//!
//! # Architecture
//!
//! - **Layer:** Lineage Store
//! - **Purpose:** Durable version history consumed by the feedback loop

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::*;
pub use infrastructure::*;
