// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the lineage CLI

pub mod config;
pub mod feedback;
pub mod query;
pub mod track;
pub mod update;

pub use self::config::ConfigCommand;
pub use self::feedback::LoopCommand;
pub use self::query::QueryCommand;
pub use self::track::TrackCommand;
pub use self::update::UpdateCommand;
