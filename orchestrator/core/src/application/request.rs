// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Submission payload accepted by [`ExecutionEngine::submit`](crate::application::engine::ExecutionEngine::submit).
//!
//! Deserializable so mission manifests can be loaded straight from YAML:
//!
//! ```yaml
//! - type: deploy
//!   priority: 1
//!   target_layers: [compute, network]
//!   simulation_required: true
//!   rollback_on_failure: true
//!   timeout: 10m
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::application::engine::EngineError;
use crate::domain::mission::{Mission, MissionId, MissionType};

pub const MAX_MISSION_ID_LEN: usize = 128;

fn default_priority() -> i32 {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionRequest {
    /// Caller-chosen id; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_id: Option<String>,

    #[serde(rename = "type")]
    pub mission_type: MissionType,

    /// Lower runs sooner. `0` is the highest priority.
    #[serde(default = "default_priority")]
    pub priority: i32,

    #[serde(default)]
    pub target_layers: Vec<String>,

    #[serde(default)]
    pub configuration: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub simulation_required: bool,

    #[serde(default)]
    pub rollback_on_failure: bool,

    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    #[serde(default)]
    pub description: String,
}

impl MissionRequest {
    pub fn new(mission_type: MissionType) -> Self {
        Self {
            mission_id: None,
            mission_type,
            priority: default_priority(),
            target_layers: Vec::new(),
            configuration: BTreeMap::new(),
            simulation_required: false,
            rollback_on_failure: false,
            timeout: None,
            description: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.mission_id = Some(id.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_target_layers<I, S>(mut self, layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_layers = layers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.configuration.insert(key.into(), value);
        self
    }

    pub fn with_simulation(mut self, required: bool) -> Self {
        self.simulation_required = required;
        self
    }

    pub fn with_rollback_on_failure(mut self, enabled: bool) -> Self {
        self.rollback_on_failure = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if let Some(id) = &self.mission_id {
            validate_mission_id(id)?;
        }
        if self.priority < 0 {
            return Err(EngineError::InvalidMission(format!(
                "priority must be >= 0, got {}",
                self.priority
            )));
        }
        if self.target_layers.is_empty() {
            return Err(EngineError::InvalidMission(
                "at least one target layer is required".to_string(),
            ));
        }
        if self.target_layers.iter().any(|layer| layer.trim().is_empty()) {
            return Err(EngineError::InvalidMission(
                "target layers must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the `PENDING` mission this request describes.
    pub fn into_mission(self) -> Mission {
        let id = self
            .mission_id
            .map(MissionId::new)
            .unwrap_or_else(MissionId::generate);
        let mut mission = Mission::new(id, self.mission_type);
        mission.priority = self.priority;
        mission.target_layers = self.target_layers;
        mission.configuration = self.configuration;
        mission.simulation_required = self.simulation_required;
        mission.rollback_on_failure = self.rollback_on_failure;
        mission.timeout = self.timeout;
        mission.description = self.description;
        mission
    }
}

/// Ids double as file names in the file store.
fn validate_mission_id(id: &str) -> Result<(), EngineError> {
    if id.is_empty() {
        return Err(EngineError::InvalidMission("mission id must not be empty".to_string()));
    }
    if id.len() > MAX_MISSION_ID_LEN {
        return Err(EngineError::InvalidMission(format!(
            "mission id exceeds {} characters",
            MAX_MISSION_ID_LEN
        )));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(EngineError::InvalidMission(format!(
            "mission id '{}' contains invalid character '{}'",
            id, bad
        )));
    }
    if id == "." || id == ".." {
        return Err(EngineError::InvalidMission(format!("mission id '{}' is reserved", id)));
    }
    Ok(())
}
