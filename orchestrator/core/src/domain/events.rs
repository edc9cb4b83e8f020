// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Mission Lifecycle Events
//!
//! Every status change a worker or the engine applies to a mission is
//! announced on the event bus as a [`MissionEvent`]. Event types live in the
//! `mission.*` namespace:
//!
//! | Type | Published when |
//! |------|----------------|
//! | `mission.submitted` | the engine accepted and queued a mission |
//! | `mission.planning` / `mission.planned` | planning started / succeeded |
//! | `mission.simulating` / `mission.simulated` | simulation started / succeeded |
//! | `mission.executing` | execution started |
//! | `mission.paused` / `mission.resumed` | execution held / released |
//! | `mission.rolling_back` / `mission.rolled_back` | rollback started / finished |
//! | `mission.succeeded` / `mission.failed` / `mission.canceled` | terminal states |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::mission::{Mission, MissionId, MissionStatus, MissionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissionEventType {
    #[serde(rename = "mission.submitted")]
    Submitted,
    #[serde(rename = "mission.planning")]
    Planning,
    #[serde(rename = "mission.planned")]
    Planned,
    #[serde(rename = "mission.simulating")]
    Simulating,
    #[serde(rename = "mission.simulated")]
    Simulated,
    #[serde(rename = "mission.executing")]
    Executing,
    #[serde(rename = "mission.succeeded")]
    Succeeded,
    #[serde(rename = "mission.failed")]
    Failed,
    #[serde(rename = "mission.canceled")]
    Canceled,
    #[serde(rename = "mission.paused")]
    Paused,
    #[serde(rename = "mission.resumed")]
    Resumed,
    #[serde(rename = "mission.rolling_back")]
    RollingBack,
    #[serde(rename = "mission.rolled_back")]
    RolledBack,
}

impl MissionEventType {
    pub const ALL: [MissionEventType; 13] = [
        Self::Submitted,
        Self::Planning,
        Self::Planned,
        Self::Simulating,
        Self::Simulated,
        Self::Executing,
        Self::Succeeded,
        Self::Failed,
        Self::Canceled,
        Self::Paused,
        Self::Resumed,
        Self::RollingBack,
        Self::RolledBack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "mission.submitted",
            Self::Planning => "mission.planning",
            Self::Planned => "mission.planned",
            Self::Simulating => "mission.simulating",
            Self::Simulated => "mission.simulated",
            Self::Executing => "mission.executing",
            Self::Succeeded => "mission.succeeded",
            Self::Failed => "mission.failed",
            Self::Canceled => "mission.canceled",
            Self::Paused => "mission.paused",
            Self::Resumed => "mission.resumed",
            Self::RollingBack => "mission.rolling_back",
            Self::RolledBack => "mission.rolled_back",
        }
    }

    /// Event announcing that a mission entered `status`.
    ///
    /// `EXECUTING` reached from `PAUSED` is announced as `mission.resumed`
    /// by the caller; `PENDING` has no entry event of its own.
    pub fn for_status(status: MissionStatus) -> Option<Self> {
        match status {
            MissionStatus::Pending => None,
            MissionStatus::Planning => Some(Self::Planning),
            MissionStatus::Simulating => Some(Self::Simulating),
            MissionStatus::Executing => Some(Self::Executing),
            MissionStatus::Paused => Some(Self::Paused),
            MissionStatus::RollingBack => Some(Self::RollingBack),
            MissionStatus::Succeeded => Some(Self::Succeeded),
            MissionStatus::Failed => Some(Self::Failed),
            MissionStatus::Canceled => Some(Self::Canceled),
            MissionStatus::RolledBack => Some(Self::RolledBack),
        }
    }
}

impl fmt::Display for MissionEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MissionEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|event_type| event_type.as_str() == s)
            .ok_or_else(|| format!("unknown mission event type '{s}'"))
    }
}

/// A lifecycle notification. Carries enough of the mission to route on;
/// subscribers that need the full record read it back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionEvent {
    pub event_type: MissionEventType,
    pub mission_id: MissionId,
    pub mission_type: MissionType,
    pub status: MissionStatus,
    pub details: Option<String>,
    pub error: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl MissionEvent {
    pub fn from_mission(event_type: MissionEventType, mission: &Mission) -> Self {
        Self {
            event_type,
            mission_id: mission.mission_id.clone(),
            mission_type: mission.mission_type,
            status: mission.status(),
            details: mission.timeline().last().map(|entry| entry.details.clone()),
            error: mission.error.clone(),
            occurred_at: Utc::now(),
        }
    }
}
