// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer of the feedback loop: feedback items, improvement proposals,
//! significance results, gate decisions, run state and configuration.

pub mod events;
pub mod feedback;
pub mod feedback_loop;
pub mod gate;
pub mod lineage_config;
pub mod proposal;
pub mod repository;
pub mod validation;
