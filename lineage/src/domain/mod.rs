// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain model for the Lineage Store bounded context
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pattern versions, typed edges, audit events and the ancestry cache

pub mod error;
pub mod events;
pub mod graph;
pub mod pattern;

pub use error::*;
pub use events::*;
pub use graph::*;
pub use pattern::*;
