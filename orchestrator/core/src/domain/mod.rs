// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Mission entity, lifecycle events, collaborator contracts, the control
//! handle passed to them, the repository
//! contract and engine configuration.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and invariants; no I/O beyond config files

pub mod collaborators;
pub mod control;
pub mod engine_config;
pub mod events;
pub mod mission;
pub mod repository;
