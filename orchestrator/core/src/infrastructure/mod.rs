// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod event_bus;
pub mod repositories;
pub mod trace_store;

pub use event_bus::{DomainEvent, EventBus, EventBusError};
pub use trace_store::{InMemoryTraceStore, JsonFileTraceStore, TraceStoreFeedbackCollector};
