// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the convoy CLI

pub mod config;
pub mod mission;
pub mod run;

pub use self::config::ConfigCommand;
pub use self::mission::MissionCommand;
pub use self::run::RunArgs;

use colored::{ColoredString, Colorize};
use convoy_core::domain::mission::MissionStatus;

/// Status label colored by outcome.
pub fn paint_status(status: MissionStatus) -> ColoredString {
    match status {
        MissionStatus::Succeeded | MissionStatus::RolledBack => status.as_str().green(),
        MissionStatus::Failed => status.as_str().red(),
        MissionStatus::Canceled | MissionStatus::Paused => status.as_str().yellow(),
        _ => status.as_str().cyan(),
    }
}
