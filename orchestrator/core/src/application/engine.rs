// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Execution Engine
//!
//! Public control surface over the mission queue, store, event bus and
//! worker pool.
//!
//! ## Lifecycle
//!
//! ```text
//! new() ──► start(n) ──► submit()/cancel()/pause()/resume()/rollback() ──► stop()
//!              ▲                                                            │
//!              └──────────────── start(n) again (queue + store kept) ◄──────┘
//! ```
//!
//! The first `start()` recovers the store: `PENDING` missions are queued
//! again and missions interrupted mid-phase are failed.
//!
//! ## Control Operations
//!
//! `cancel`, `pause` and `resume` run under the [`ActiveMissions`] lock. A
//! mission owned by a worker is only signalled; the worker applies the
//! request at its next phase boundary. An unowned mission (still queued) is
//! updated in the store directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::control::ActiveMissions;
use crate::application::queue::MissionQueue;
use crate::application::request::MissionRequest;
use crate::application::worker::{record_finished, Worker, WorkerContext};
use crate::domain::collaborators::Collaborators;
use crate::domain::engine_config::{EngineConfigManifest, EngineSettings};
use crate::domain::events::{MissionEvent, MissionEventType};
use crate::domain::mission::{
    Mission, MissionError, MissionId, MissionStatus, MissionType, Severity, TimelineEvent,
};
use crate::domain::repository::{MissionRepository, RepositoryError};
use crate::infrastructure::event_bus::{
    EventBus, EventBusError, EventReceiver, MissionEventReceiver, SubscriptionId,
};
use crate::infrastructure::repositories::open_repository;

/// Error recorded on missions that were mid-phase when the engine went down.
pub const INTERRUPTED_ERROR: &str = "interrupted: engine restarted";

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine is not running")]
    NotRunning,

    #[error("Invalid mission: {0}")]
    InvalidMission(String),

    #[error("Mission not found: {0}")]
    MissionNotFound(MissionId),

    #[error("Mission already exists: {0}")]
    DuplicateMission(MissionId),

    #[error("Mission {id} is {status}: {reason}")]
    InvalidState {
        id: MissionId,
        status: MissionStatus,
        reason: String,
    },

    #[error(transparent)]
    InvalidTransition(#[from] MissionError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => EngineError::MissionNotFound(id),
            RepositoryError::DuplicateMission(id) => EngineError::DuplicateMission(id),
            other => EngineError::Repository(other),
        }
    }
}

/// Snapshot returned by [`ExecutionEngine::get_status`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub is_running: bool,
    pub queue_size: usize,
    pub active_mission_count: usize,
    pub worker_count: usize,
    pub uptime: Duration,
}

struct WorkerPool {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    started_at: Instant,
}

pub struct ExecutionEngine {
    ctx: Arc<WorkerContext>,
    settings: EngineSettings,
    pool: Mutex<Option<WorkerPool>>,
    running: AtomicBool,
    recovered: AtomicBool,
}

impl ExecutionEngine {
    pub fn new(
        repository: Arc<dyn MissionRepository>,
        collaborators: Collaborators,
        settings: EngineSettings,
    ) -> Self {
        let ctx = WorkerContext {
            repository,
            queue: Arc::new(MissionQueue::new()),
            event_bus: Arc::new(EventBus::new(settings.event_channel_capacity)),
            active: Arc::new(ActiveMissions::new()),
            collaborators,
            dequeue_timeout: settings.dequeue_timeout,
        };
        Self {
            ctx: Arc::new(ctx),
            settings,
            pool: Mutex::new(None),
            running: AtomicBool::new(false),
            recovered: AtomicBool::new(false),
        }
    }

    /// Open the configured store and build an engine around it.
    pub async fn from_config(
        config: &EngineConfigManifest,
        collaborators: Collaborators,
    ) -> Result<Self, EngineError> {
        let repository = open_repository(&config.spec.store.storage_backend()).await?;
        Ok(Self::new(repository, collaborators, config.spec.engine.clone()))
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn `worker_count` workers. A no-op if the pool is already running.
    pub async fn start(&self, worker_count: usize) -> Result<(), EngineError> {
        if worker_count == 0 {
            return Err(EngineError::InvalidConfiguration(
                "worker_count must be at least 1".to_string(),
            ));
        }

        let mut pool = self.pool.lock().await;
        if pool.is_some() {
            warn!("Execution engine already running, ignoring start()");
            return Ok(());
        }

        if !self.recovered.load(Ordering::SeqCst) {
            self.recover().await?;
            self.recovered.store(true, Ordering::SeqCst);
        }

        let shutdown = CancellationToken::new();
        let handles = (0..worker_count)
            .map(|id| Worker::new(id, self.ctx.clone(), shutdown.clone()).spawn())
            .collect();
        *pool = Some(WorkerPool {
            shutdown,
            handles,
            started_at: Instant::now(),
        });
        self.running.store(true, Ordering::SeqCst);

        info!(
            worker_count,
            queued = self.ctx.queue.len(),
            "Execution engine started"
        );
        Ok(())
    }

    /// Stop accepting work and let workers finish their current mission.
    ///
    /// Waits up to the configured grace period. Workers still busy after that
    /// are left to finish in the background; they are never aborted mid-phase.
    pub async fn stop(&self) {
        let Some(pool) = self.pool.lock().await.take() else {
            debug!("Execution engine not running, ignoring stop()");
            return;
        };
        self.running.store(false, Ordering::SeqCst);
        pool.shutdown.cancel();

        let grace = self.settings.shutdown_grace_period;
        match tokio::time::timeout(grace, futures::future::join_all(pool.handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        error!(error = %e, "Worker task terminated abnormally");
                    }
                }
                info!(queued = self.ctx.queue.len(), "Execution engine stopped");
            }
            Err(_) => {
                warn!(
                    grace_period = ?grace,
                    "Workers still busy after grace period; they will finish their current mission"
                );
            }
        }
    }

    /// Queue missions left behind by a previous process.
    async fn recover(&self) -> Result<(), EngineError> {
        let missions = self.ctx.repository.list(None, usize::MAX, 0).await?;
        let (mut requeued, mut interrupted) = (0usize, 0usize);

        // Listed newest first; requeue oldest first so submission order holds.
        for mut mission in missions.into_iter().rev() {
            match mission.status() {
                MissionStatus::Pending => {
                    self.ctx.queue.enqueue(mission);
                    requeued += 1;
                }
                MissionStatus::Planning
                | MissionStatus::Simulating
                | MissionStatus::Executing
                | MissionStatus::RollingBack => {
                    if mission.status() != MissionStatus::RollingBack || mission.error.is_none() {
                        mission.error = Some(INTERRUPTED_ERROR.to_string());
                    }
                    mission.transition_to(
                        MissionStatus::Failed,
                        TimelineEvent::Failed,
                        INTERRUPTED_ERROR,
                        Severity::Error,
                    )?;
                    self.ctx.repository.update(&mission).await?;
                    self.ctx
                        .event_bus
                        .publish(MissionEvent::from_mission(MissionEventType::Failed, &mission));
                    record_finished(&mission);
                    interrupted += 1;
                }
                _ => {}
            }
        }

        if requeued > 0 || interrupted > 0 {
            info!(requeued, interrupted, "Recovered missions from store");
        }
        Ok(())
    }

    /// Validate, persist and queue a mission. Returns its id.
    pub async fn submit(&self, request: MissionRequest) -> Result<MissionId, EngineError> {
        if !self.is_running() {
            return Err(EngineError::NotRunning);
        }
        request.validate()?;

        let mut mission = request.into_mission();
        let details = format!("Submitted with priority {}", mission.priority);
        mission.record(TimelineEvent::Submitted, details, Severity::Info)?;
        self.ctx.repository.create(&mission).await?;

        // Announce before queueing so `mission.submitted` always precedes the
        // worker's `mission.planning`.
        let mission_id = mission.mission_id.clone();
        self.ctx
            .event_bus
            .publish(MissionEvent::from_mission(MissionEventType::Submitted, &mission));
        self.ctx.queue.enqueue(mission);
        metrics::counter!("convoy_missions_submitted_total").increment(1);

        info!(mission_id = %mission_id, "Mission submitted");
        Ok(mission_id)
    }

    /// Cancel a non-terminal mission.
    ///
    /// Returns `false` when there is nothing to cancel: the mission is
    /// terminal, or it is rolling back.
    pub async fn cancel(&self, id: &MissionId) -> Result<bool, EngineError> {
        let owned = self.ctx.active.lock().await;
        let mut mission = self.ctx.repository.get(id).await?;
        if mission.is_terminal() {
            return Ok(false);
        }

        if let Some(control) = owned.get(id) {
            if mission.status() == MissionStatus::RollingBack {
                return Ok(false);
            }
            control.request_cancel();
            info!(mission_id = %id, status = %mission.status(), "Cancellation requested");
            return Ok(true);
        }

        if !mission.status().can_transition_to(MissionStatus::Canceled) {
            return Ok(false);
        }
        mission.transition_to(
            MissionStatus::Canceled,
            TimelineEvent::Canceled,
            "Canceled before a worker picked it up",
            Severity::Warning,
        )?;
        self.ctx.repository.update(&mission).await?;
        drop(owned);

        self.ctx
            .event_bus
            .publish(MissionEvent::from_mission(MissionEventType::Canceled, &mission));
        record_finished(&mission);
        Ok(true)
    }

    /// Request a pause. Only valid while the mission is executing.
    pub async fn pause(&self, id: &MissionId) -> Result<bool, EngineError> {
        let owned = self.ctx.active.lock().await;
        let mission = self.ctx.repository.get(id).await?;
        match owned.get(id) {
            Some(control) if mission.status() == MissionStatus::Executing => {
                if control.is_pause_requested() {
                    return Ok(false);
                }
                control.request_pause();
                info!(mission_id = %id, "Pause requested");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Release a paused mission. Only valid while the mission is paused.
    pub async fn resume(&self, id: &MissionId) -> Result<bool, EngineError> {
        let owned = self.ctx.active.lock().await;
        let mission = self.ctx.repository.get(id).await?;
        match owned.get(id) {
            Some(control) if mission.status() == MissionStatus::Paused => {
                control.clear_pause();
                info!(mission_id = %id, "Resume requested");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Submit a new highest-priority `Rollback` mission for `id`.
    ///
    /// The original mission is left untouched.
    pub async fn rollback(&self, id: &MissionId) -> Result<MissionId, EngineError> {
        let original = self.ctx.repository.get(id).await?;
        if !matches!(
            original.status(),
            MissionStatus::Succeeded | MissionStatus::Failed | MissionStatus::Executing
        ) {
            return Err(EngineError::InvalidState {
                id: id.clone(),
                status: original.status(),
                reason: "only succeeded, failed or executing missions can be rolled back"
                    .to_string(),
            });
        }

        let request = MissionRequest::new(MissionType::Rollback)
            .with_priority(0)
            .with_target_layers(original.target_layers.clone())
            .with_rollback_on_failure(false)
            .with_config("original_mission_id", serde_json::json!(id.as_str()))
            .with_config(
                "original_mission_type",
                serde_json::json!(original.mission_type.as_str()),
            )
            .with_description(format!("Rollback of {}", id));

        let rollback_id = self.submit(request).await?;
        info!(mission_id = %id, rollback_mission_id = %rollback_id, "Rollback mission submitted");
        Ok(rollback_id)
    }

    pub async fn get_status(&self) -> EngineStatus {
        let pool = self.pool.lock().await;
        EngineStatus {
            is_running: pool.is_some(),
            queue_size: self.ctx.queue.len(),
            active_mission_count: self.ctx.active.len().await,
            worker_count: pool.as_ref().map_or(0, |pool| pool.handles.len()),
            uptime: pool
                .as_ref()
                .map_or(Duration::ZERO, |pool| pool.started_at.elapsed()),
        }
    }

    pub async fn get_mission(&self, id: &MissionId) -> Result<Mission, EngineError> {
        Ok(self.ctx.repository.get(id).await?)
    }

    pub async fn get_missions(
        &self,
        status: Option<MissionStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Mission>, EngineError> {
        Ok(self.ctx.repository.list(status, limit, offset).await?)
    }

    /// Remove a finished mission from the store.
    pub async fn delete_mission(&self, id: &MissionId) -> Result<(), EngineError> {
        let mission = self.ctx.repository.get(id).await?;
        if !mission.is_terminal() {
            return Err(EngineError::InvalidState {
                id: id.clone(),
                status: mission.status(),
                reason: "only terminal missions can be deleted".to_string(),
            });
        }
        self.ctx.repository.delete(id).await?;
        info!(mission_id = %id, "Mission deleted");
        Ok(())
    }

    /// Register a listener for an event type (`mission.failed`) or `*`.
    pub fn subscribe<F>(
        &self,
        event_type: &str,
        callback: F,
    ) -> Result<SubscriptionId, EventBusError>
    where
        F: Fn(&MissionEvent) + Send + Sync + 'static,
    {
        self.ctx.event_bus.subscribe(event_type, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.ctx.event_bus.unsubscribe(id)
    }

    pub fn event_stream(&self) -> EventReceiver {
        self.ctx.event_bus.subscribe_stream()
    }

    pub fn mission_stream(&self, id: MissionId) -> MissionEventReceiver {
        self.ctx.event_bus.subscribe_mission(id)
    }

    /// Missions currently owned by a worker.
    pub async fn active_missions(&self) -> Vec<MissionId> {
        self.ctx.active.ids().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::collaborators::dry_run_collaborators;
    use crate::infrastructure::repositories::InMemoryMissionRepository;

    fn engine() -> ExecutionEngine {
        let settings = EngineSettings {
            dequeue_timeout: Duration::from_millis(20),
            ..EngineSettings::default()
        };
        ExecutionEngine::new(
            Arc::new(InMemoryMissionRepository::new()),
            dry_run_collaborators(),
            settings,
        )
    }

    #[tokio::test]
    async fn test_submit_requires_running_engine() {
        let engine = engine();
        let request = MissionRequest::new(MissionType::Deploy).with_target_layers(["compute"]);
        assert!(matches!(
            engine.submit(request).await,
            Err(EngineError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_start_rejects_zero_workers() {
        let engine = engine();
        assert!(matches!(
            engine.start(0).await,
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_status_reflects_pool() {
        let engine = engine();
        let stopped = engine.get_status().await;
        assert!(!stopped.is_running);
        assert_eq!(stopped.worker_count, 0);
        assert_eq!(stopped.uptime, Duration::ZERO);

        engine.start(3).await.unwrap();
        let running = engine.get_status().await;
        assert!(running.is_running);
        assert_eq!(running.worker_count, 3);

        engine.stop().await;
        assert!(!engine.get_status().await.is_running);
    }

    #[tokio::test]
    async fn test_repository_errors_map_to_engine_errors() {
        let id = MissionId::new("m-1");
        assert!(matches!(
            EngineError::from(RepositoryError::NotFound(id.clone())),
            EngineError::MissionNotFound(_)
        ));
        assert!(matches!(
            EngineError::from(RepositoryError::DuplicateMission(id)),
            EngineError::DuplicateMission(_)
        ));
        assert!(matches!(
            EngineError::from(RepositoryError::Storage("disk".into())),
            EngineError::Repository(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_rejects_non_terminal_missions() {
        let repository = Arc::new(InMemoryMissionRepository::new());
        let pending = Mission::new(MissionId::new("pending-1"), MissionType::Scale);
        repository.create(&pending).await.unwrap();
        let engine = ExecutionEngine::new(
            repository,
            dry_run_collaborators(),
            EngineSettings::default(),
        );

        assert!(matches!(
            engine.delete_mission(&pending.mission_id).await,
            Err(EngineError::InvalidState { .. })
        ));
        assert!(matches!(
            engine.delete_mission(&MissionId::new("nope")).await,
            Err(EngineError::MissionNotFound(_))
        ));
    }
}
