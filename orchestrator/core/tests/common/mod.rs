// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared fixtures for engine integration tests.
//!
//! [`StubCollaborators`] reads its behaviour from the mission configuration:
//! `stub.<phase>` set to `fail:<msg>`, `error:<msg>` or `panic:<msg>`.
//! Anything else (or no key) succeeds. Phases can also be held on a gate
//! until the test opens it.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use convoy_core::application::{ExecutionEngine, MissionControl};
use convoy_core::domain::collaborators::{
    Collaborators, ErrorHandler, ExecutionOutcome, Executor, PlanOutcome, Planner,
    RecoveryManager, RollbackOutcome, SimulationOutcome, Simulator,
};
use convoy_core::domain::engine_config::EngineSettings;
use convoy_core::domain::mission::{Mission, MissionId, MissionStatus};
use convoy_core::domain::repository::MissionRepository;
use convoy_core::infrastructure::repositories::InMemoryMissionRepository;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Plan,
    Simulate,
    Execute,
    Rollback,
}

impl Phase {
    fn key(&self) -> &'static str {
        match self {
            Phase::Plan => "stub.plan",
            Phase::Simulate => "stub.simulate",
            Phase::Execute => "stub.execute",
            Phase::Rollback => "stub.rollback",
        }
    }
}

enum Scripted {
    Succeed,
    Fail(String),
    Error(String),
    Panic(String),
}

fn scripted(mission: &Mission, phase: Phase) -> Scripted {
    let Some(raw) = mission
        .configuration
        .get(phase.key())
        .and_then(|value| value.as_str())
    else {
        return Scripted::Succeed;
    };
    let (kind, message) = raw.split_once(':').unwrap_or((raw, ""));
    match kind {
        "fail" => Scripted::Fail(message.to_string()),
        "error" => Scripted::Error(message.to_string()),
        "panic" => Scripted::Panic(message.to_string()),
        _ => Scripted::Succeed,
    }
}

fn resolve<T>(
    scripted: Scripted,
    succeeded: impl FnOnce() -> T,
    failed: impl FnOnce(String) -> T,
) -> anyhow::Result<T> {
    match scripted {
        Scripted::Succeed => Ok(succeeded()),
        Scripted::Fail(message) => Ok(failed(message)),
        Scripted::Error(message) => Err(anyhow::anyhow!(message)),
        Scripted::Panic(message) => panic!("{}", message),
    }
}

/// A phase barrier that stays closed until [`Gate::open`].
pub struct Gate {
    tx: watch::Sender<bool>,
}

impl Gate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    async fn pass(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

#[derive(Default)]
pub struct StubCollaborators {
    plan_gate: Option<Gate>,
    execute_gate: Option<Gate>,
    calls: Mutex<Vec<(Phase, MissionId)>>,
}

impl StubCollaborators {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hold every planning call until `open_plan_gate`.
    pub fn with_plan_gate() -> Arc<Self> {
        Arc::new(Self {
            plan_gate: Some(Gate::new()),
            ..Self::default()
        })
    }

    /// Hold every executor call until `open_execute_gate`.
    pub fn with_execute_gate() -> Arc<Self> {
        Arc::new(Self {
            execute_gate: Some(Gate::new()),
            ..Self::default()
        })
    }

    pub fn open_plan_gate(&self) {
        if let Some(gate) = &self.plan_gate {
            gate.open();
        }
    }

    pub fn open_execute_gate(&self) {
        if let Some(gate) = &self.execute_gate {
            gate.open();
        }
    }

    pub fn calls(&self, phase: Phase) -> Vec<MissionId> {
        self.calls
            .lock()
            .iter()
            .filter(|(called, _)| *called == phase)
            .map(|(_, id)| id.clone())
            .collect()
    }

    fn enter(&self, phase: Phase, mission: &Mission) {
        self.calls.lock().push((phase, mission.mission_id.clone()));
    }
}

#[async_trait]
impl Planner for StubCollaborators {
    async fn plan(
        &self,
        mission: &Mission,
        _control: &MissionControl,
    ) -> anyhow::Result<PlanOutcome> {
        self.enter(Phase::Plan, mission);
        if let Some(gate) = &self.plan_gate {
            gate.pass().await;
        }
        resolve(
            scripted(mission, Phase::Plan),
            || PlanOutcome::succeeded("planned"),
            PlanOutcome::failed,
        )
    }
}

#[async_trait]
impl Simulator for StubCollaborators {
    async fn simulate(
        &self,
        mission: &Mission,
        _control: &MissionControl,
    ) -> anyhow::Result<SimulationOutcome> {
        self.enter(Phase::Simulate, mission);
        resolve(
            scripted(mission, Phase::Simulate),
            || SimulationOutcome {
                capsules: Some(vec!["capsule-a".to_string()]),
                layers: Some(vec!["simulated".to_string()]),
                ..SimulationOutcome::succeeded("simulated")
            },
            SimulationOutcome::failed,
        )
    }
}

#[async_trait]
impl Executor for StubCollaborators {
    async fn execute(
        &self,
        mission: &Mission,
        _control: &MissionControl,
    ) -> anyhow::Result<ExecutionOutcome> {
        self.enter(Phase::Execute, mission);
        if let Some(gate) = &self.execute_gate {
            gate.pass().await;
        }
        resolve(
            scripted(mission, Phase::Execute),
            || ExecutionOutcome {
                layers: Some(mission.target_layers.clone()),
                ..ExecutionOutcome::succeeded("executed")
            },
            ExecutionOutcome::failed,
        )
    }
}

#[async_trait]
impl RecoveryManager for StubCollaborators {
    async fn rollback(
        &self,
        mission: &Mission,
        _control: &MissionControl,
    ) -> anyhow::Result<RollbackOutcome> {
        self.enter(Phase::Rollback, mission);
        resolve(
            scripted(mission, Phase::Rollback),
            RollbackOutcome::succeeded,
            RollbackOutcome::failed,
        )
    }
}

/// Records every unexpected error and prefixes the stored message.
#[derive(Default)]
pub struct RecordingErrorHandler {
    pub handled: Mutex<Vec<(MissionId, String)>>,
}

#[async_trait]
impl ErrorHandler for RecordingErrorHandler {
    async fn handle(&self, mission: &Mission, error: &anyhow::Error) -> String {
        let message = format!("handled: {error:#}");
        self.handled
            .lock()
            .push((mission.mission_id.clone(), message.clone()));
        message
    }
}

pub fn collaborators(
    stub: &Arc<StubCollaborators>,
    handler: &Arc<RecordingErrorHandler>,
) -> Collaborators {
    Collaborators::new(
        stub.clone(),
        stub.clone(),
        stub.clone(),
        stub.clone(),
        handler.clone(),
    )
}

pub fn test_settings() -> EngineSettings {
    EngineSettings {
        dequeue_timeout: Duration::from_millis(20),
        shutdown_grace_period: Duration::from_secs(5),
        ..EngineSettings::default()
    }
}

pub fn engine_on(
    repository: Arc<dyn MissionRepository>,
    stub: &Arc<StubCollaborators>,
    handler: &Arc<RecordingErrorHandler>,
) -> ExecutionEngine {
    ExecutionEngine::new(repository, collaborators(stub, handler), test_settings())
}

pub fn engine(stub: &Arc<StubCollaborators>) -> (ExecutionEngine, Arc<RecordingErrorHandler>) {
    let handler = Arc::new(RecordingErrorHandler::default());
    let engine = engine_on(Arc::new(InMemoryMissionRepository::new()), stub, &handler);
    (engine, handler)
}

/// Poll the store until `predicate` holds.
pub async fn wait_until(
    engine: &ExecutionEngine,
    id: &MissionId,
    predicate: impl Fn(&Mission) -> bool,
) -> Mission {
    tokio::time::timeout(WAIT_TIMEOUT, async {
        loop {
            let mission = engine.get_mission(id).await.expect("mission exists");
            if predicate(&mission) {
                return mission;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting on mission {}", id))
}

pub async fn wait_for_status(
    engine: &ExecutionEngine,
    id: &MissionId,
    status: MissionStatus,
) -> Mission {
    wait_until(engine, id, |mission| mission.status() == status).await
}

pub async fn wait_terminal(engine: &ExecutionEngine, id: &MissionId) -> Mission {
    wait_until(engine, id, Mission::is_terminal).await
}

/// Wait until no worker owns a mission and the queue is drained.
pub async fn wait_idle(engine: &ExecutionEngine) {
    tokio::time::timeout(WAIT_TIMEOUT, async {
        loop {
            let status = engine.get_status().await;
            if status.queue_size == 0 && status.active_mission_count == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("engine did not go idle");
}
