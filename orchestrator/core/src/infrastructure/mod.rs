// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod collaborators;
pub mod event_bus;
pub mod repositories;

pub use collaborators::dry_run_collaborators;
pub use event_bus::{EventBus, EventBusError, SubscriptionId, ALL_EVENTS};
