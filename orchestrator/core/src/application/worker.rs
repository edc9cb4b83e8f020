// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Mission Worker
//!
//! A worker dequeues one mission at a time and drives it through its phases:
//!
//! ```text
//! PENDING → PLANNING → [SIMULATING] → EXECUTING → SUCCEEDED
//!                                         │
//!                                         ├─ rollback_on_failure → ROLLING_BACK → ROLLED_BACK | FAILED
//!                                         └─ otherwise → FAILED
//! ```
//!
//! Every transition is persisted before it is published. Cancel and pause
//! requests are applied at phase boundaries (see [`MissionControl`]).
//! Collaborator errors and panics never escape the worker: the mission is
//! failed through the [`ErrorHandler`](crate::domain::collaborators::ErrorHandler)
//! and the loop moves on to the next mission.

use anyhow::Context;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::control::{ActiveMissions, MissionControl, Release};
use crate::application::queue::MissionQueue;
use crate::domain::collaborators::{Collaborators, RollbackOutcome};
use crate::domain::events::{MissionEvent, MissionEventType};
use crate::domain::mission::{Mission, MissionId, MissionStatus, Severity, TimelineEvent};
use crate::domain::repository::MissionRepository;
use crate::infrastructure::event_bus::EventBus;

/// Shared state every worker (and the engine) operates on.
pub(crate) struct WorkerContext {
    pub repository: Arc<dyn MissionRepository>,
    pub queue: Arc<MissionQueue>,
    pub event_bus: Arc<EventBus>,
    pub active: Arc<ActiveMissions>,
    pub collaborators: Collaborators,
    pub dequeue_timeout: Duration,
}

impl WorkerContext {
    /// Persist the record, then announce it.
    pub async fn persist_and_publish(
        &self,
        mission: &Mission,
        event_type: MissionEventType,
    ) -> anyhow::Result<()> {
        self.repository
            .update(mission)
            .await
            .with_context(|| format!("failed to persist mission {}", mission.mission_id))?;
        self.event_bus
            .publish(MissionEvent::from_mission(event_type, mission));
        Ok(())
    }
}

/// Record terminal-state metrics for a mission.
pub(crate) fn record_finished(mission: &Mission) {
    metrics::counter!(
        "convoy_missions_finished_total",
        "status" => mission.status().as_str()
    )
    .increment(1);
    if let Some(duration) = mission.duration().and_then(|d| d.to_std().ok()) {
        metrics::histogram!(
            "convoy_mission_duration_seconds",
            "mission_type" => mission.mission_type.as_str()
        )
        .record(duration.as_secs_f64());
    }
    info!(
        mission_id = %mission.mission_id,
        status = %mission.status(),
        error = mission.error.as_deref().unwrap_or(""),
        "Mission finished"
    );
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Whether the worker should keep driving the mission after a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub(crate) struct Worker {
    id: usize,
    ctx: Arc<WorkerContext>,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(id: usize, ctx: Arc<WorkerContext>, shutdown: CancellationToken) -> Self {
        Self { id, ctx, shutdown }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        info!(worker_id = self.id, "Worker started");

        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                mission = self.ctx.queue.dequeue(self.ctx.dequeue_timeout) => mission,
            };

            if let Some(mission) = next {
                self.process(mission.mission_id).await;
            }
        }

        info!(worker_id = self.id, "Worker stopped");
    }

    async fn process(&self, mission_id: MissionId) {
        let Some(control) = self.ctx.active.claim(&mission_id).await else {
            warn!(
                worker_id = self.id,
                mission_id = %mission_id,
                "Mission already owned by another worker, skipping"
            );
            return;
        };
        metrics::gauge!("convoy_active_missions").increment(1.0);

        // The claim is released no matter how the mission ended.
        let outcome = AssertUnwindSafe(self.process_claimed(&mission_id, &control))
            .catch_unwind()
            .await;
        if let Err(panic) = outcome {
            error!(
                worker_id = self.id,
                mission_id = %mission_id,
                panic = %panic_message(&*panic),
                "Worker panicked while finishing mission"
            );
        }

        self.ctx.active.release(&mission_id).await;
        metrics::gauge!("convoy_active_missions").decrement(1.0);
    }

    async fn process_claimed(&self, mission_id: &MissionId, control: &MissionControl) {
        // Re-read after claiming: the queued copy may be stale if the mission
        // was canceled while it waited.
        let mut mission = match self.ctx.repository.get(mission_id).await {
            Ok(mission) => mission,
            Err(e) => {
                error!(
                    worker_id = self.id,
                    mission_id = %mission_id,
                    error = %e,
                    "Failed to load dequeued mission"
                );
                return;
            }
        };

        let result = AssertUnwindSafe(self.drive(&mut mission, control))
            .catch_unwind()
            .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.handle_unexpected(&mut mission, err).await,
            Err(panic) => {
                let err = anyhow::anyhow!("worker panicked: {}", panic_message(&*panic));
                self.handle_unexpected(&mut mission, err).await;
            }
        }
    }

    async fn drive(&self, mission: &mut Mission, control: &MissionControl) -> anyhow::Result<()> {
        match mission.status() {
            MissionStatus::Pending => {}
            MissionStatus::Canceled => {
                debug!(
                    mission_id = %mission.mission_id,
                    "Mission canceled while queued, skipping"
                );
                return Ok(());
            }
            other => {
                warn!(
                    mission_id = %mission.mission_id,
                    status = %other,
                    "Dequeued mission is not pending, skipping"
                );
                return Ok(());
            }
        }

        info!(
            worker_id = self.id,
            mission_id = %mission.mission_id,
            mission_type = %mission.mission_type,
            priority = mission.priority,
            "Processing mission"
        );

        if self.checkpoint(mission, control).await? == Flow::Stop {
            return Ok(());
        }

        // Plan
        self.advance(
            mission,
            MissionStatus::Planning,
            TimelineEvent::PlanningStarted,
            "Planning started",
            Severity::Info,
        )
        .await?;
        let plan = self
            .ctx
            .collaborators
            .planner
            .plan(mission, control)
            .await
            .context("planner failed")?;
        if !plan.success {
            let error = plan.error.unwrap_or_else(|| "planning failed".to_string());
            return self.fail(mission, TimelineEvent::PlanningFailed, error).await;
        }
        let details = plan
            .summary
            .clone()
            .unwrap_or_else(|| "Planning completed".to_string());
        mission.plan_summary = plan.summary;
        mission.record(TimelineEvent::PlanningCompleted, details, Severity::Info)?;
        self.ctx
            .persist_and_publish(mission, MissionEventType::Planned)
            .await?;

        if self.checkpoint(mission, control).await? == Flow::Stop {
            return Ok(());
        }

        // Simulate
        if mission.simulation_required {
            self.advance(
                mission,
                MissionStatus::Simulating,
                TimelineEvent::SimulationStarted,
                "Simulation started",
                Severity::Info,
            )
            .await?;
            let simulation = self
                .ctx
                .collaborators
                .simulator
                .simulate(mission, control)
                .await
                .context("simulator failed")?;
            if !simulation.success {
                let error = simulation
                    .error
                    .unwrap_or_else(|| "simulation failed".to_string());
                return self
                    .fail(mission, TimelineEvent::SimulationFailed, error)
                    .await;
            }
            let details = simulation
                .summary
                .clone()
                .unwrap_or_else(|| "Simulation completed".to_string());
            mission.simulation_summary = simulation.summary;
            mission.validation_results = simulation.validation_results;
            if let Some(capsules) = simulation.capsules {
                mission.capsules = capsules;
            }
            if let Some(layers) = simulation.layers {
                mission.layers = layers;
            }
            mission.record(TimelineEvent::SimulationCompleted, details, Severity::Info)?;
            self.ctx
                .persist_and_publish(mission, MissionEventType::Simulated)
                .await?;

            if self.checkpoint(mission, control).await? == Flow::Stop {
                return Ok(());
            }
        }

        // Execute
        self.advance(
            mission,
            MissionStatus::Executing,
            TimelineEvent::ExecutionStarted,
            "Execution started",
            Severity::Info,
        )
        .await?;
        if self.checkpoint(mission, control).await? == Flow::Stop {
            return Ok(());
        }
        let execution = self
            .ctx
            .collaborators
            .executor
            .execute(mission, control)
            .await
            .context("executor failed")?;

        mission.execution_summary = execution.summary.clone();
        if let Some(capsules) = execution.capsules {
            mission.capsules = capsules;
        }
        if let Some(layers) = execution.layers {
            mission.layers = layers;
        }
        mission.resources.extend(execution.resources);

        if execution.success {
            if self.checkpoint(mission, control).await? == Flow::Stop {
                return Ok(());
            }
            let details = execution
                .summary
                .unwrap_or_else(|| "Execution completed".to_string());
            self.advance(
                mission,
                MissionStatus::Succeeded,
                TimelineEvent::ExecutionCompleted,
                details,
                Severity::Info,
            )
            .await?;
            record_finished(mission);
            return Ok(());
        }

        let error = execution
            .error
            .unwrap_or_else(|| "execution failed".to_string());
        if !mission.rollback_on_failure {
            return self
                .fail(mission, TimelineEvent::ExecutionFailed, error)
                .await;
        }

        self.roll_back(mission, control, error).await
    }

    /// Execution failed with rollback enabled:
    /// `EXECUTING → ROLLING_BACK → ROLLED_BACK | FAILED`.
    async fn roll_back(
        &self,
        mission: &mut Mission,
        control: &MissionControl,
        error: String,
    ) -> anyhow::Result<()> {
        mission.error = Some(error.clone());
        mission.record(TimelineEvent::ExecutionFailed, error, Severity::Error)?;
        self.advance(
            mission,
            MissionStatus::RollingBack,
            TimelineEvent::RollbackStarted,
            "Rollback started",
            Severity::Warning,
        )
        .await?;

        let rollback = match self
            .ctx
            .collaborators
            .recovery
            .rollback(mission, control)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => RollbackOutcome::failed(self.describe_error(mission, &err).await),
        };

        if rollback.success {
            self.advance(
                mission,
                MissionStatus::RolledBack,
                TimelineEvent::RollbackCompleted,
                "Rollback completed",
                Severity::Info,
            )
            .await?;
        } else {
            // The execution error stays on the mission; the rollback error only
            // goes into the timeline.
            let details = rollback
                .error
                .unwrap_or_else(|| "rollback failed".to_string());
            self.advance(
                mission,
                MissionStatus::Failed,
                TimelineEvent::RollbackFailed,
                details,
                Severity::Error,
            )
            .await?;
        }
        record_finished(mission);
        Ok(())
    }

    /// Apply pending cancel/pause requests. Pause is only honored while executing.
    async fn checkpoint(
        &self,
        mission: &mut Mission,
        control: &MissionControl,
    ) -> anyhow::Result<Flow> {
        loop {
            if control.is_cancel_requested() {
                info!(
                    mission_id = %mission.mission_id,
                    status = %mission.status(),
                    "Canceling mission"
                );
                self.advance(
                    mission,
                    MissionStatus::Canceled,
                    TimelineEvent::Canceled,
                    "Canceled on request",
                    Severity::Warning,
                )
                .await?;
                record_finished(mission);
                return Ok(Flow::Stop);
            }

            if mission.status() != MissionStatus::Executing || !control.is_pause_requested() {
                return Ok(Flow::Continue);
            }

            info!(mission_id = %mission.mission_id, "Pausing mission");
            self.advance(
                mission,
                MissionStatus::Paused,
                TimelineEvent::Paused,
                "Paused on request",
                Severity::Info,
            )
            .await?;

            match control.wait_released().await {
                Release::Resumed => {
                    info!(mission_id = %mission.mission_id, "Resuming mission");
                    self.advance(
                        mission,
                        MissionStatus::Executing,
                        TimelineEvent::Resumed,
                        "Resumed on request",
                        Severity::Info,
                    )
                    .await?;
                }
                // Loop back so the cancel branch applies PAUSED → CANCELED.
                Release::Canceled => {}
            }
        }
    }

    /// Transition, persist and publish. The in-memory mission only takes the
    /// new state once the store has accepted it.
    async fn advance(
        &self,
        mission: &mut Mission,
        next: MissionStatus,
        event: TimelineEvent,
        details: impl Into<String>,
        severity: Severity,
    ) -> anyhow::Result<()> {
        let previous = mission.status();
        let mut updated = mission.clone();
        updated.transition_to(next, event, details, severity)?;

        let event_type = if previous == MissionStatus::Paused && next == MissionStatus::Executing {
            MissionEventType::Resumed
        } else {
            MissionEventType::for_status(next)
                .with_context(|| format!("no lifecycle event for status {next}"))?
        };

        debug!(
            worker_id = self.id,
            mission_id = %mission.mission_id,
            from = %previous,
            to = %next,
            "Mission transition"
        );
        self.ctx.persist_and_publish(&updated, event_type).await?;
        *mission = updated;
        Ok(())
    }

    async fn fail(
        &self,
        mission: &mut Mission,
        event: TimelineEvent,
        error: String,
    ) -> anyhow::Result<()> {
        mission.error = Some(error.clone());
        self.advance(mission, MissionStatus::Failed, event, error, Severity::Error)
            .await?;
        record_finished(mission);
        Ok(())
    }

    /// Ask the error handler for a message. A panicking handler falls back
    /// to the error's own chain.
    async fn describe_error(&self, mission: &Mission, err: &anyhow::Error) -> String {
        let handler = &self.ctx.collaborators.error_handler;
        match AssertUnwindSafe(handler.handle(mission, err))
            .catch_unwind()
            .await
        {
            Ok(message) => message,
            Err(panic) => {
                error!(
                    worker_id = self.id,
                    mission_id = %mission.mission_id,
                    panic = %panic_message(&*panic),
                    "Error handler panicked"
                );
                format!("{err:#}")
            }
        }
    }

    /// Last resort for collaborator errors, panics and persistence failures.
    ///
    /// A paused mission cannot fail, so it ends as canceled with the error
    /// attached. Anything else that can still fail is failed.
    async fn handle_unexpected(&self, mission: &mut Mission, err: anyhow::Error) {
        let message = self.describe_error(mission, &err).await;

        let (next, event, event_type) = match mission.status() {
            MissionStatus::Paused => (
                MissionStatus::Canceled,
                TimelineEvent::Canceled,
                MissionEventType::Canceled,
            ),
            status if status.can_transition_to(MissionStatus::Failed) => (
                MissionStatus::Failed,
                TimelineEvent::Failed,
                MissionEventType::Failed,
            ),
            status => {
                error!(
                    worker_id = self.id,
                    mission_id = %mission.mission_id,
                    status = %status,
                    error = %message,
                    "Unexpected error on a mission that cannot be ended from its current state"
                );
                return;
            }
        };

        // A failed rollback keeps the execution error that triggered it.
        if mission.status() != MissionStatus::RollingBack || mission.error.is_none() {
            mission.error = Some(message.clone());
        }
        if let Err(e) = mission.transition_to(next, event, message, Severity::Error) {
            error!(
                mission_id = %mission.mission_id,
                error = %e,
                "Failed to end mission after unexpected error"
            );
            return;
        }
        if let Err(e) = self.ctx.persist_and_publish(mission, event_type).await {
            error!(
                mission_id = %mission.mission_id,
                status = %next,
                error = %format!("{e:#}"),
                "Failed to persist mission after unexpected error"
            );
            return;
        }
        record_finished(mission);
    }
}
