// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::mission::{Mission, MissionId, MissionStatus};
use crate::domain::repository::{page, MissionRepository, RepositoryError};

/// HashMap-backed repository. Every write swaps the whole record under the
/// write lock, so readers never observe a partially updated mission.
#[derive(Debug, Default)]
pub struct InMemoryMissionRepository {
    missions: RwLock<HashMap<MissionId, Mission>>,
}

impl InMemoryMissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.missions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.read().is_empty()
    }
}

#[async_trait]
impl MissionRepository for InMemoryMissionRepository {
    async fn create(&self, mission: &Mission) -> Result<(), RepositoryError> {
        let mut missions = self.missions.write();
        if missions.contains_key(&mission.mission_id) {
            return Err(RepositoryError::DuplicateMission(mission.mission_id.clone()));
        }
        missions.insert(mission.mission_id.clone(), mission.clone());
        Ok(())
    }

    async fn update(&self, mission: &Mission) -> Result<(), RepositoryError> {
        let mut missions = self.missions.write();
        match missions.get_mut(&mission.mission_id) {
            Some(existing) => {
                *existing = mission.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(mission.mission_id.clone())),
        }
    }

    async fn get(&self, id: &MissionId) -> Result<Mission, RepositoryError> {
        self.missions
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
        let snapshot: Vec<Mission> = self.missions.read().values().cloned().collect();
        Ok(page(snapshot, status, limit, offset))
    }

    async fn delete(&self, id: &MissionId) -> Result<(), RepositoryError> {
        self.missions
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mission::{MissionType, Severity, TimelineEvent};
    use chrono::Duration;

    fn mission(id: &str, age_minutes: i64) -> Mission {
        let mut mission = Mission::new(MissionId::new(id), MissionType::Scale);
        mission.created_at = mission.created_at - Duration::minutes(age_minutes);
        mission
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let repo = InMemoryMissionRepository::new();
        let mut record = mission("m-1", 0);
        repo.create(&record).await.unwrap();

        assert!(matches!(
            repo.create(&record).await,
            Err(RepositoryError::DuplicateMission(_))
        ));

        record
            .transition_to(
                MissionStatus::Planning,
                TimelineEvent::PlanningStarted,
                "",
                Severity::Info,
            )
            .unwrap();
        repo.update(&record).await.unwrap();
        assert_eq!(repo.get(&record.mission_id).await.unwrap().status(), MissionStatus::Planning);

        repo.delete(&record.mission_id).await.unwrap();
        assert!(matches!(
            repo.get(&record.mission_id).await,
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            repo.update(&record).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_newest_first_filtered_and_paginated() {
        let repo = InMemoryMissionRepository::new();
        repo.create(&mission("oldest", 30)).await.unwrap();
        repo.create(&mission("middle", 20)).await.unwrap();
        let mut canceled = mission("newest", 10);
        canceled
            .transition_to(MissionStatus::Canceled, TimelineEvent::Canceled, "", Severity::Warning)
            .unwrap();
        repo.create(&canceled).await.unwrap();

        let ids = |missions: Vec<Mission>| {
            missions
                .into_iter()
                .map(|m| m.mission_id.to_string())
                .collect::<Vec<_>>()
        };

        assert_eq!(
            ids(repo.list(None, 10, 0).await.unwrap()),
            vec!["newest", "middle", "oldest"]
        );
        assert_eq!(ids(repo.list(None, 1, 1).await.unwrap()), vec!["middle"]);
        assert_eq!(
            ids(repo.list(Some(MissionStatus::Pending), 10, 0).await.unwrap()),
            vec!["middle", "oldest"]
        );
        assert!(repo.list(None, 10, 5).await.unwrap().is_empty());
        assert_eq!(repo.len(), 3);
    }
}
