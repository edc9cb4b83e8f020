// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod control;
pub mod engine;
pub mod queue;
pub mod request;
mod worker;

// Re-export the engine surface for convenience
pub use control::{MissionControl, Release};
pub use engine::{EngineError, EngineStatus, ExecutionEngine, INTERRUPTED_ERROR};
pub use request::MissionRequest;
