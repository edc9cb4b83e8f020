// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of [`MissionRepository`], following the
//! Repository pattern from DDD.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve mission records
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **InMemoryMissionRepository** - Thread-safe HashMap-backed storage for tests
//!   and throwaway runs
//! - **FileMissionRepository** - One JSON record per mission in a directory,
//!   loaded into memory at startup and written through on every change
//!
//! # Usage
//!
//! ```no_run
//! # async fn run() -> Result<(), convoy_core::domain::repository::RepositoryError> {
//! use convoy_core::domain::repository::StorageBackend;
//! use convoy_core::infrastructure::repositories::open_repository;
//!
//! let repo = open_repository(&StorageBackend::File("./.convoy/missions".into())).await?;
//! # Ok(())
//! # }
//! ```

pub mod file;
pub mod in_memory;

pub use file::FileMissionRepository;
pub use in_memory::InMemoryMissionRepository;

use std::sync::Arc;

use crate::domain::repository::{MissionRepository, RepositoryError, StorageBackend};

/// Build the repository selected by configuration.
pub async fn open_repository(
    backend: &StorageBackend,
) -> Result<Arc<dyn MissionRepository>, RepositoryError> {
    match backend {
        StorageBackend::InMemory => Ok(Arc::new(InMemoryMissionRepository::new())),
        StorageBackend::File(path) => Ok(Arc::new(FileMissionRepository::open(path).await?)),
    }
}
