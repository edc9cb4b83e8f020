// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Mission Repository Interface
//!
//! Persistence contract for the [`Mission`] aggregate, following the DDD
//! Repository pattern: interface defined in the domain layer, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Implementation | Medium |
//! |----------------|--------|
//! | `InMemoryMissionRepository` | process memory (tests, ephemeral runs) |
//! | `FileMissionRepository` | one JSON record per mission on disk |
//!
//! ## Write Semantics
//!
//! - `create` and `update` replace the whole record; there are no partial
//!   field updates, so a timeline is never persisted half-written.
//! - Writes to the same mission id are serialized; writes to different ids
//!   never wait on each other.
//! - Writes go straight through to the medium; nothing is buffered.

use async_trait::async_trait;

use crate::domain::mission::{Mission, MissionId, MissionStatus};

/// Storage backend selection, resolved from the engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    InMemory,
    File(std::path::PathBuf),
}

#[async_trait]
pub trait MissionRepository: Send + Sync {
    /// Persist a new record. Fails with `DuplicateMission` if the id exists.
    async fn create(&self, mission: &Mission) -> Result<(), RepositoryError>;

    /// Atomically replace an existing record.
    async fn update(&self, mission: &Mission) -> Result<(), RepositoryError>;

    async fn get(&self, id: &MissionId) -> Result<Mission, RepositoryError>;

    /// Newest first by `created_at`, optionally filtered by status, paginated.
    async fn list(
        &self,
        status: Option<MissionStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Mission>, RepositoryError>;

    async fn delete(&self, id: &MissionId) -> Result<(), RepositoryError>;
}

/// Sort newest-first and paginate; shared by the repository implementations.
pub(crate) fn page(
    mut missions: Vec<Mission>,
    status: Option<MissionStatus>,
    limit: usize,
    offset: usize,
) -> Vec<Mission> {
    if let Some(status) = status {
        missions.retain(|mission| mission.status() == status);
    }
    missions.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.mission_id.cmp(&a.mission_id))
    });
    missions.into_iter().skip(offset).take(limit).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Mission not found: {0}")]
    NotFound(MissionId),

    #[error("Mission already exists: {0}")]
    DuplicateMission(MissionId),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        RepositoryError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
