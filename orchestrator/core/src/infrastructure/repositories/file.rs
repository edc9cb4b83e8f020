// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! File-backed Mission Repository
//!
//! Stores each mission as `<mission_id>.json` inside one directory. The whole
//! directory is loaded into memory when the repository is opened; every
//! `create`/`update`/`delete` is written through to disk before the in-memory
//! copy changes, so a crash loses at most the transition in flight.
//!
//! **Write path:** serialize → `<id>.json.tmp` → fsync → rename over
//! `<id>.json`. The rename is atomic on POSIX filesystems, so readers (and
//! external tooling) only ever see complete records. Leftover `.tmp` files
//! from an interrupted write are removed on open.
//!
//! **Locking:** each mission id has its own async lock held across the disk
//! write. Writes to one id are serialized; writes to different ids proceed
//! in parallel.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::domain::mission::{Mission, MissionId, MissionStatus};
use crate::domain::repository::{page, MissionRepository, RepositoryError};

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

pub struct FileMissionRepository {
    dir: PathBuf,
    records: RwLock<HashMap<MissionId, Mission>>,
    write_locks: DashMap<MissionId, Arc<tokio::sync::Mutex<()>>>,
}

impl FileMissionRepository {
    /// Open (creating if needed) a repository directory and load every record.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await.map_err(|e| {
            RepositoryError::Storage(format!(
                "Failed to create mission directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut records = HashMap::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match path.extension().and_then(|ext| ext.to_str()) {
                Some(TEMP_EXTENSION) => {
                    debug!(path = %path.display(), "Removing interrupted write");
                    let _ = fs::remove_file(&path).await;
                }
                Some(RECORD_EXTENSION) => match Self::read_record(&path).await {
                    Ok(mission) => {
                        records.insert(mission.mission_id.clone(), mission);
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "Skipping unreadable mission record"
                        );
                    }
                },
                _ => {}
            }
        }

        info!(
            dir = %dir.display(),
            missions = records.len(),
            "Loaded mission store"
        );

        Ok(Self {
            dir,
            records: RwLock::new(records),
            write_locks: DashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &MissionId) -> PathBuf {
        self.dir.join(format!("{}.{}", id.as_str(), RECORD_EXTENSION))
    }

    fn write_lock(&self, id: &MissionId) -> Arc<tokio::sync::Mutex<()>> {
        self.write_locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn contains(&self, id: &MissionId) -> bool {
        self.records.read().contains_key(id)
    }

    async fn read_record(path: &Path) -> Result<Mission, RepositoryError> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_atomic(&self, mission: &Mission) -> Result<(), RepositoryError> {
        let path = self.record_path(&mission.mission_id);
        let tmp_path = path.with_extension(format!("{}.{}", RECORD_EXTENSION, TEMP_EXTENSION));
        let content = serde_json::to_vec_pretty(mission)?;

        fs::write(&tmp_path, &content).await?;

        let sync_path = tmp_path.clone();
        match tokio::task::spawn_blocking(move || {
            std::fs::File::open(&sync_path).and_then(|file| file.sync_all())
        })
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to sync mission record to disk"),
            Err(e) => warn!(error = %e, "Failed to sync mission record to disk"),
        }

        fs::rename(&tmp_path, &path).await?;
        debug!(path = %path.display(), "Mission record written");
        Ok(())
    }
}

#[async_trait]
impl MissionRepository for FileMissionRepository {
    async fn create(&self, mission: &Mission) -> Result<(), RepositoryError> {
        let lock = self.write_lock(&mission.mission_id);
        let _guard = lock.lock().await;

        if self.contains(&mission.mission_id) {
            return Err(RepositoryError::DuplicateMission(mission.mission_id.clone()));
        }
        self.write_atomic(mission).await?;
        self.records
            .write()
            .insert(mission.mission_id.clone(), mission.clone());
        Ok(())
    }

    async fn update(&self, mission: &Mission) -> Result<(), RepositoryError> {
        let lock = self.write_lock(&mission.mission_id);
        let _guard = lock.lock().await;

        if !self.contains(&mission.mission_id) {
            return Err(RepositoryError::NotFound(mission.mission_id.clone()));
        }
        self.write_atomic(mission).await?;
        self.records
            .write()
            .insert(mission.mission_id.clone(), mission.clone());
        Ok(())
    }

    async fn get(&self, id: &MissionId) -> Result<Mission, RepositoryError> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))
    }

    async fn list(
        &self,
        status: Option<MissionStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Mission>, RepositoryError> {
        let snapshot: Vec<Mission> = self.records.read().values().cloned().collect();
        Ok(page(snapshot, status, limit, offset))
    }

    async fn delete(&self, id: &MissionId) -> Result<(), RepositoryError> {
        let lock = self.write_lock(id);
        let _guard = lock.lock().await;

        if !self.contains(id) {
            return Err(RepositoryError::NotFound(id.clone()));
        }
        match fs::remove_file(self.record_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.records.write().remove(id);
        Ok(())
    }
}
