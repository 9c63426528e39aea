// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Feedback loop orchestration over the pattern lineage store
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Collects execution feedback, proposes improvements, validates
//!   them statistically and records applied ones as new lineage versions

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
