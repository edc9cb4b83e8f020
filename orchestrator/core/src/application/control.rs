// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Cooperative Mission Control
//!
//! A worker that owns a mission is its only writer. Control operations from
//! the engine (`cancel`, `pause`, `resume`) therefore never touch an owned
//! record: they flip flags on the mission's [`MissionControl`] and the worker
//! applies them at its next phase boundary.
//!
//! [`ActiveMissions`] is the ownership registry. Workers claim a mission in
//! it before reading the record and release it when done. The engine holds
//! the registry lock while it decides between "signal the owner" and "mutate
//! the unowned record", so the two can never interleave.

use std::collections::HashMap;
use tokio::sync::{Mutex, MutexGuard};

pub use crate::domain::control::{MissionControl, Release};
use crate::domain::mission::MissionId;

pub(crate) type OwnedMissions = HashMap<MissionId, MissionControl>;

/// Registry of missions currently owned by a worker.
#[derive(Debug, Default)]
pub struct ActiveMissions {
    owned: Mutex<OwnedMissions>,
}

impl ActiveMissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take exclusive ownership. `None` if another worker already owns it.
    pub async fn claim(&self, id: &MissionId) -> Option<MissionControl> {
        let mut owned = self.owned.lock().await;
        if owned.contains_key(id) {
            return None;
        }
        let control = MissionControl::new();
        owned.insert(id.clone(), control.clone());
        Some(control)
    }

    pub async fn release(&self, id: &MissionId) {
        self.owned.lock().await.remove(id);
    }

    pub async fn len(&self) -> usize {
        self.owned.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.owned.lock().await.is_empty()
    }

    pub async fn ids(&self) -> Vec<MissionId> {
        let mut ids: Vec<MissionId> = self.owned.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Exclusive view used by engine control operations.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, OwnedMissions> {
        self.owned.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let registry = ActiveMissions::new();
        let id = MissionId::new("m-1");

        assert!(registry.claim(&id).await.is_some());
        assert!(registry.claim(&id).await.is_none());
        assert_eq!(registry.len().await, 1);

        registry.release(&id).await;
        assert!(registry.is_empty().await);
        assert!(registry.claim(&id).await.is_some());
    }

    #[tokio::test]
    async fn test_claimed_control_is_shared_with_registry() {
        let registry = ActiveMissions::new();
        let id = MissionId::new("m-2");

        let control = registry.claim(&id).await.unwrap();
        registry.lock().await.get(&id).unwrap().request_cancel();
        assert!(control.is_cancel_requested());
        assert_eq!(registry.ids().await, vec![id]);
    }
}
