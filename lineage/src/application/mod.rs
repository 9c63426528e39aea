// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application services for the Lineage Store bounded context

pub mod lineage_service;
pub mod traversal;

pub use lineage_service::{
    AncestryView, Descendant, DescendantsView, LineageService, StandardLineageService,
};
