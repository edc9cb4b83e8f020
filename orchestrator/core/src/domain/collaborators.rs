// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Phase Collaborators
//!
//! The engine owns *when* a phase runs; these traits own *what* it does.
//! Each worker calls out to them with the mission and its
//! [`MissionControl`] handle so long-running collaborators can observe a
//! cancel or pause request.
//!
//! ## Result Contract
//!
//! - `Ok(outcome)` with `success == false` is a **phase failure**: it drives
//!   the failure edge of the state machine and is recorded as the mission error.
//! - `Err(_)` (or a panic) is an **unexpected error**: the worker hands it to
//!   the [`ErrorHandler`] and fails the mission.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::control::MissionControl;
use crate::domain::mission::{Mission, ResourceSample};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub summary: Option<String>,
}

impl PlanOutcome {
    pub fn succeeded(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            error: None,
            summary: Some(summary.into()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            summary: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub summary: Option<String>,
    pub validation_results: BTreeMap<String, Vec<String>>,
    pub capsules: Option<Vec<String>>,
    pub layers: Option<Vec<String>>,
}

impl SimulationOutcome {
    pub fn succeeded(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: Some(summary.into()),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub summary: Option<String>,
    pub capsules: Option<Vec<String>>,
    pub layers: Option<Vec<String>>,
    pub resources: Vec<ResourceSample>,
}

impl ExecutionOutcome {
    pub fn succeeded(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: Some(summary.into()),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollbackOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl RollbackOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        mission: &Mission,
        control: &MissionControl,
    ) -> anyhow::Result<PlanOutcome>;
}

#[async_trait]
pub trait Simulator: Send + Sync {
    async fn simulate(
        &self,
        mission: &Mission,
        control: &MissionControl,
    ) -> anyhow::Result<SimulationOutcome>;
}

#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        mission: &Mission,
        control: &MissionControl,
    ) -> anyhow::Result<ExecutionOutcome>;
}

#[async_trait]
pub trait RecoveryManager: Send + Sync {
    async fn rollback(
        &self,
        mission: &Mission,
        control: &MissionControl,
    ) -> anyhow::Result<RollbackOutcome>;
}

/// Translates unexpected errors into the message stored on the mission.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    async fn handle(&self, mission: &Mission, error: &anyhow::Error) -> String;
}

/// The injected collaborator set shared by every worker.
#[derive(Clone)]
pub struct Collaborators {
    pub planner: Arc<dyn Planner>,
    pub simulator: Arc<dyn Simulator>,
    pub executor: Arc<dyn Executor>,
    pub recovery: Arc<dyn RecoveryManager>,
    pub error_handler: Arc<dyn ErrorHandler>,
}

impl Collaborators {
    pub fn new(
        planner: Arc<dyn Planner>,
        simulator: Arc<dyn Simulator>,
        executor: Arc<dyn Executor>,
        recovery: Arc<dyn RecoveryManager>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> Self {
        Self {
            planner,
            simulator,
            executor,
            recovery,
            error_handler,
        }
    }
}
