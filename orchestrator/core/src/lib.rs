// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Convoy Core
//!
//! Deployment mission orchestration: a priority-scheduled worker pool that
//! drives missions through plan, simulate, execute and rollback phases.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Mission lifecycle, scheduling, persistence and events

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use application::{EngineError, EngineStatus, ExecutionEngine, MissionRequest};
pub use domain::*;
