// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Dry-run phase collaborators.
//!
//! Every phase succeeds and describes what it *would* do to the mission's
//! target layers. A failure can be injected per mission through its
//! configuration:
//!
//! ```yaml
//! configuration:
//!   dry_run.fail_phase: execute   # plan | simulate | execute | rollback
//!   dry_run.error: disk full      # optional, defaults to "injected failure"
//! ```

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

use crate::domain::collaborators::{
    Collaborators, ErrorHandler, ExecutionOutcome, Executor, PlanOutcome, Planner,
    RecoveryManager, RollbackOutcome, SimulationOutcome, Simulator,
};
use crate::domain::control::MissionControl;
use crate::domain::mission::{Mission, ResourceSample};

pub const FAIL_PHASE_KEY: &str = "dry_run.fail_phase";
pub const FAIL_ERROR_KEY: &str = "dry_run.error";
const DEFAULT_INJECTED_ERROR: &str = "injected failure";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Plan,
    Simulate,
    Execute,
    Rollback,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Phase::Plan => "plan",
            Phase::Simulate => "simulate",
            Phase::Execute => "execute",
            Phase::Rollback => "rollback",
        }
    }
}

/// The injected error message if `mission` asks `phase` to fail.
fn injected_failure(mission: &Mission, phase: Phase) -> Option<String> {
    let requested = mission.configuration.get(FAIL_PHASE_KEY)?.as_str()?;
    if !requested.eq_ignore_ascii_case(phase.as_str()) {
        return None;
    }
    let message = mission
        .configuration
        .get(FAIL_ERROR_KEY)
        .and_then(|value| value.as_str())
        .unwrap_or(DEFAULT_INJECTED_ERROR);
    debug!(mission_id = %mission.mission_id, phase = phase.as_str(), "Injecting dry-run failure");
    Some(message.to_string())
}

fn layer_list(mission: &Mission) -> String {
    mission.target_layers.join(", ")
}

#[derive(Debug, Default, Clone)]
pub struct DryRunPlanner;

#[async_trait]
impl Planner for DryRunPlanner {
    async fn plan(
        &self,
        mission: &Mission,
        _control: &MissionControl,
    ) -> anyhow::Result<PlanOutcome> {
        if let Some(error) = injected_failure(mission, Phase::Plan) {
            return Ok(PlanOutcome::failed(error));
        }
        Ok(PlanOutcome::succeeded(format!(
            "{} plan: {} step(s) across [{}]",
            mission.mission_type,
            mission.target_layers.len(),
            layer_list(mission)
        )))
    }
}

#[derive(Debug, Default, Clone)]
pub struct DryRunSimulator;

#[async_trait]
impl Simulator for DryRunSimulator {
    async fn simulate(
        &self,
        mission: &Mission,
        _control: &MissionControl,
    ) -> anyhow::Result<SimulationOutcome> {
        if let Some(error) = injected_failure(mission, Phase::Simulate) {
            return Ok(SimulationOutcome::failed(error));
        }

        let mut validation_results = BTreeMap::new();
        validation_results.insert(
            "layers".to_string(),
            mission
                .target_layers
                .iter()
                .map(|layer| format!("{layer}: reachable"))
                .collect(),
        );

        Ok(SimulationOutcome {
            validation_results,
            capsules: Some(
                mission
                    .target_layers
                    .iter()
                    .map(|layer| format!("{layer}-capsule"))
                    .collect(),
            ),
            layers: Some(mission.target_layers.clone()),
            ..SimulationOutcome::succeeded(format!(
                "simulated {} against [{}]",
                mission.mission_type,
                layer_list(mission)
            ))
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct DryRunExecutor;

#[async_trait]
impl Executor for DryRunExecutor {
    async fn execute(
        &self,
        mission: &Mission,
        _control: &MissionControl,
    ) -> anyhow::Result<ExecutionOutcome> {
        if let Some(error) = injected_failure(mission, Phase::Execute) {
            return Ok(ExecutionOutcome::failed(error));
        }

        let resources = mission
            .target_layers
            .iter()
            .map(|_| ResourceSample {
                timestamp: Utc::now(),
                cpu_percent: 0.0,
                memory_mb: 0.0,
                network_kbps: 0.0,
            })
            .collect();

        Ok(ExecutionOutcome {
            layers: Some(mission.target_layers.clone()),
            resources,
            ..ExecutionOutcome::succeeded(format!(
                "{} applied to [{}] (dry run)",
                mission.mission_type,
                layer_list(mission)
            ))
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct DryRunRecoveryManager;

#[async_trait]
impl RecoveryManager for DryRunRecoveryManager {
    async fn rollback(
        &self,
        mission: &Mission,
        _control: &MissionControl,
    ) -> anyhow::Result<RollbackOutcome> {
        if let Some(error) = injected_failure(mission, Phase::Rollback) {
            return Ok(RollbackOutcome::failed(error));
        }
        Ok(RollbackOutcome::succeeded())
    }
}

/// Logs unexpected errors and stores their full context chain as the message.
#[derive(Debug, Default, Clone)]
pub struct TracingErrorHandler;

#[async_trait]
impl ErrorHandler for TracingErrorHandler {
    async fn handle(&self, mission: &Mission, err: &anyhow::Error) -> String {
        let message = format!("{err:#}");
        error!(
            mission_id = %mission.mission_id,
            status = %mission.status(),
            error = %message,
            "Unexpected error while processing mission"
        );
        message
    }
}

/// The full dry-run collaborator set.
pub fn dry_run_collaborators() -> Collaborators {
    Collaborators::new(
        Arc::new(DryRunPlanner),
        Arc::new(DryRunSimulator),
        Arc::new(DryRunExecutor),
        Arc::new(DryRunRecoveryManager),
        Arc::new(TracingErrorHandler),
    )
}
