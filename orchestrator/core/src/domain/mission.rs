// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Mission Aggregate
//!
//! A [`Mission`] is one unit of orchestrated deployment work. It carries its
//! own lifecycle state machine, per-phase timestamps, phase results, and an
//! append-only [`TimelineEntry`] audit trail.
//!
//! ## State Machine
//!
//! ```text
//! PENDING ──► PLANNING ──► SIMULATING ──► EXECUTING ──► SUCCEEDED
//!    │           │  │          │   │         │ │ │ ▲
//!    │           │  └──────────┼───┼────────►│ │ │ │
//!    ▼           ▼             ▼   ▼         │ │ ▼ │
//! CANCELED ◄─────┴─────────────┘  FAILED ◄───┘ │ PAUSED ──► CANCELED
//!                                   ▲          ▼
//!                                   └──── ROLLING_BACK ──► ROLLED_BACK
//! ```
//!
//! Only [`MissionStatus::can_transition_to`] edges are legal. Every status
//! change goes through [`Mission::transition_to`], which appends exactly one
//! timeline entry and stamps the matching phase timestamp. Once a mission is
//! terminal nothing more may be recorded on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a [`Mission`].
///
/// Caller-supplied or engine-generated (`mission-<uuid>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MissionId(String);

impl MissionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh engine-side identifier.
    pub fn generate() -> Self {
        Self(format!("mission-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MissionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MissionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionType {
    Deploy,
    Update,
    Rollback,
    Scale,
    Migrate,
    Backup,
    Restore,
    HealthCheck,
    SecurityScan,
    ComplianceCheck,
}

impl MissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Update => "update",
            Self::Rollback => "rollback",
            Self::Scale => "scale",
            Self::Migrate => "migrate",
            Self::Backup => "backup",
            Self::Restore => "restore",
            Self::HealthCheck => "health_check",
            Self::SecurityScan => "security_scan",
            Self::ComplianceCheck => "compliance_check",
        }
    }
}

impl fmt::Display for MissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionStatus {
    Pending,
    Planning,
    Simulating,
    Executing,
    Paused,
    RollingBack,
    Succeeded,
    Failed,
    Canceled,
    RolledBack,
}

impl MissionStatus {
    pub const ALL: [MissionStatus; 10] = [
        Self::Pending,
        Self::Planning,
        Self::Simulating,
        Self::Executing,
        Self::Paused,
        Self::RollingBack,
        Self::Succeeded,
        Self::Failed,
        Self::Canceled,
        Self::RolledBack,
    ];

    /// Terminal states are never left again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Canceled | Self::RolledBack
        )
    }

    /// The transition graph. Everything not listed here is illegal.
    pub fn can_transition_to(&self, next: MissionStatus) -> bool {
        use MissionStatus::*;
        matches!(
            (self, next),
            (Pending, Planning)
                | (Pending, Canceled)
                | (Planning, Simulating)
                | (Planning, Executing)
                | (Planning, Failed)
                | (Planning, Canceled)
                | (Simulating, Executing)
                | (Simulating, Failed)
                | (Simulating, Canceled)
                | (Executing, Succeeded)
                | (Executing, RollingBack)
                | (Executing, Failed)
                | (Executing, Paused)
                | (Executing, Canceled)
                | (Paused, Executing)
                | (Paused, Canceled)
                | (RollingBack, RolledBack)
                | (RollingBack, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Planning => "PLANNING",
            Self::Simulating => "SIMULATING",
            Self::Executing => "EXECUTING",
            Self::Paused => "PAUSED",
            Self::RollingBack => "ROLLING_BACK",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::RolledBack => "ROLLED_BACK",
        }
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MissionStatus {
    type Err = MissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| MissionError::UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Names of timeline records. Serialized as `snake_case` strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEvent {
    Submitted,
    PlanningStarted,
    PlanningCompleted,
    PlanningFailed,
    SimulationStarted,
    SimulationCompleted,
    SimulationFailed,
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    RollbackStarted,
    RollbackCompleted,
    RollbackFailed,
    Paused,
    Resumed,
    Canceled,
    Failed,
}

/// One entry of the append-only audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    pub event: TimelineEvent,
    pub details: String,
    pub severity: Severity,
}

/// Observational resource sample reported by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub network_kbps: f64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MissionError {
    #[error("illegal transition {from} -> {to}")]
    InvalidTransition {
        from: MissionStatus,
        to: MissionStatus,
    },

    #[error("mission is terminal ({0}); no further records allowed")]
    Terminal(MissionStatus),

    #[error("unknown mission status '{0}'")]
    UnknownStatus(String),
}

/// The mission aggregate. Serialized flat; this is the persisted record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub mission_id: MissionId,
    #[serde(rename = "type")]
    pub mission_type: MissionType,
    status: MissionStatus,
    pub priority: i32,
    pub target_layers: Vec<String>,
    #[serde(default)]
    pub configuration: BTreeMap<String, serde_json::Value>,
    pub simulation_required: bool,
    pub rollback_on_failure: bool,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub description: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub planning_started_at: Option<DateTime<Utc>>,
    pub planning_completed_at: Option<DateTime<Utc>>,
    pub simulation_started_at: Option<DateTime<Utc>>,
    pub simulation_completed_at: Option<DateTime<Utc>>,
    pub execution_started_at: Option<DateTime<Utc>>,
    pub execution_completed_at: Option<DateTime<Utc>>,
    pub succeeded_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub resumed_at: Option<DateTime<Utc>>,
    pub rollback_started_at: Option<DateTime<Utc>>,
    pub rollback_completed_at: Option<DateTime<Utc>>,

    timeline: Vec<TimelineEntry>,
    pub error: Option<String>,
    pub plan_summary: Option<String>,
    pub simulation_summary: Option<String>,
    pub execution_summary: Option<String>,
    #[serde(default)]
    pub validation_results: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub resources: Vec<ResourceSample>,
    #[serde(default)]
    pub capsules: Vec<String>,
    #[serde(default)]
    pub layers: Vec<String>,
}

impl Mission {
    /// A fresh `PENDING` mission with an empty timeline.
    pub fn new(mission_id: MissionId, mission_type: MissionType) -> Self {
        let now = Utc::now();
        Self {
            mission_id,
            mission_type,
            status: MissionStatus::Pending,
            priority: 5,
            target_layers: Vec::new(),
            configuration: BTreeMap::new(),
            simulation_required: false,
            rollback_on_failure: false,
            timeout: None,
            description: String::new(),
            created_at: now,
            updated_at: now,
            planning_started_at: None,
            planning_completed_at: None,
            simulation_started_at: None,
            simulation_completed_at: None,
            execution_started_at: None,
            execution_completed_at: None,
            succeeded_at: None,
            failed_at: None,
            canceled_at: None,
            paused_at: None,
            resumed_at: None,
            rollback_started_at: None,
            rollback_completed_at: None,
            timeline: Vec::new(),
            error: None,
            plan_summary: None,
            simulation_summary: None,
            execution_summary: None,
            validation_results: BTreeMap::new(),
            resources: Vec::new(),
            capsules: Vec::new(),
            layers: Vec::new(),
        }
    }

    pub fn status(&self) -> MissionStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    /// Move to `next`, appending exactly one timeline entry.
    pub fn transition_to(
        &mut self,
        next: MissionStatus,
        event: TimelineEvent,
        details: impl Into<String>,
        severity: Severity,
    ) -> Result<(), MissionError> {
        if !self.status.can_transition_to(next) {
            return Err(MissionError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        let previous = self.status;
        self.status = next;
        self.stamp_transition(previous, next, now);
        self.push_entry(now, event, details.into(), severity);
        Ok(())
    }

    /// Append a non-transition record (phase completion, notes).
    pub fn record(
        &mut self,
        event: TimelineEvent,
        details: impl Into<String>,
        severity: Severity,
    ) -> Result<(), MissionError> {
        if self.status.is_terminal() {
            return Err(MissionError::Terminal(self.status));
        }

        let now = Utc::now();
        match event {
            TimelineEvent::PlanningCompleted => self.planning_completed_at = Some(now),
            TimelineEvent::SimulationCompleted => self.simulation_completed_at = Some(now),
            TimelineEvent::ExecutionCompleted | TimelineEvent::ExecutionFailed => {
                self.execution_completed_at = Some(now)
            }
            _ => {}
        }
        self.push_entry(now, event, details.into(), severity);
        Ok(())
    }

    fn stamp_transition(&mut self, from: MissionStatus, to: MissionStatus, now: DateTime<Utc>) {
        use MissionStatus::*;
        match to {
            Planning => self.planning_started_at = Some(now),
            Simulating => {
                self.planning_completed_at.get_or_insert(now);
                self.simulation_started_at = Some(now);
            }
            Executing if from == Paused => self.resumed_at = Some(now),
            Executing => {
                if from == Simulating {
                    self.simulation_completed_at.get_or_insert(now);
                } else {
                    self.planning_completed_at.get_or_insert(now);
                }
                self.execution_started_at = Some(now);
            }
            Paused => self.paused_at = Some(now),
            RollingBack => {
                self.execution_completed_at.get_or_insert(now);
                self.rollback_started_at = Some(now);
            }
            Succeeded => {
                self.execution_completed_at.get_or_insert(now);
                self.succeeded_at = Some(now);
            }
            Failed => {
                if from == RollingBack {
                    self.rollback_completed_at = Some(now);
                } else if from == Executing {
                    self.execution_completed_at.get_or_insert(now);
                }
                self.failed_at = Some(now);
            }
            Canceled => self.canceled_at = Some(now),
            RolledBack => self.rollback_completed_at = Some(now),
            Pending => {}
        }
    }

    fn push_entry(
        &mut self,
        timestamp: DateTime<Utc>,
        event: TimelineEvent,
        details: String,
        severity: Severity,
    ) {
        self.updated_at = timestamp;
        self.timeline.push(TimelineEntry {
            timestamp,
            event,
            details,
            severity,
        });
    }

    /// Total wall-clock time from the first planning step to the terminal state.
    pub fn duration(&self) -> Option<chrono::Duration> {
        let started = self.planning_started_at?;
        let ended = [
            self.succeeded_at,
            self.failed_at,
            self.canceled_at,
            self.rollback_completed_at,
        ]
        .into_iter()
        .flatten()
        .max()?;
        Some(ended - started)
    }
}
