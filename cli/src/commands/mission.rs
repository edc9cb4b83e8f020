// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mission store inspection commands
//!
//! Commands: list, show, delete

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use convoy_core::application::ExecutionEngine;
use convoy_core::domain::engine_config::{EngineConfigManifest, StoreBackendKind};
use convoy_core::domain::mission::{Mission, MissionId, MissionStatus, Severity};
use convoy_core::infrastructure::collaborators::dry_run_collaborators;

use super::paint_status;

#[derive(Subcommand)]
pub enum MissionCommand {
    /// List missions, newest first
    List {
        /// Only show missions in this status (e.g. FAILED, rolled_back)
        #[arg(long, value_parser = parse_status)]
        status: Option<MissionStatus>,

        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Number of results to skip
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Show a mission with its timeline
    Show {
        /// Mission ID
        #[arg(value_name = "MISSION_ID")]
        mission_id: String,

        /// Print the raw JSON record
        #[arg(long)]
        json: bool,
    },

    /// Delete a finished mission
    Delete {
        /// Mission ID
        #[arg(value_name = "MISSION_ID")]
        mission_id: String,
    },
}

fn parse_status(value: &str) -> Result<MissionStatus, String> {
    value.parse::<MissionStatus>().map_err(|e| e.to_string())
}

pub async fn handle_command(command: MissionCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = EngineConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    if config.spec.store.backend == StoreBackendKind::Memory {
        eprintln!(
            "{}",
            "Store backend is 'memory'; nothing is persisted between runs.".yellow()
        );
    }
    let engine = ExecutionEngine::from_config(&config, dry_run_collaborators())
        .await
        .context("Failed to open mission store")?;

    match command {
        MissionCommand::List {
            status,
            limit,
            offset,
        } => list(&engine, status, limit, offset).await,
        MissionCommand::Show { mission_id, json } => show(&engine, mission_id, json).await,
        MissionCommand::Delete { mission_id } => delete(&engine, mission_id).await,
    }
}

async fn list(
    engine: &ExecutionEngine,
    status: Option<MissionStatus>,
    limit: usize,
    offset: usize,
) -> Result<()> {
    let missions = engine.get_missions(status, limit, offset).await?;
    if missions.is_empty() {
        println!("{}", "No missions found".dimmed());
        return Ok(());
    }

    println!(
        "{:<40} {:<16} {:<14} {:>4}  {}",
        "ID".bold(),
        "TYPE".bold(),
        "STATUS".bold(),
        "PRI".bold(),
        "CREATED".bold()
    );
    for mission in &missions {
        println!(
            "{:<40} {:<16} {:<14} {:>4}  {}",
            mission.mission_id.as_str(),
            mission.mission_type.as_str(),
            paint_status(mission.status()),
            mission.priority,
            mission.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

async fn show(engine: &ExecutionEngine, mission_id: String, json: bool) -> Result<()> {
    let mission = engine.get_mission(&MissionId::new(mission_id)).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&mission)?);
        return Ok(());
    }
    print_mission(&mission);
    Ok(())
}

fn print_mission(mission: &Mission) {
    println!("{} {}", "Mission:".bold(), mission.mission_id);
    println!("  Type: {}", mission.mission_type);
    println!("  Status: {}", paint_status(mission.status()));
    println!("  Priority: {}", mission.priority);
    println!("  Target layers: {}", mission.target_layers.join(", "));
    if !mission.description.is_empty() {
        println!("  Description: {}", mission.description);
    }
    if let Some(error) = &mission.error {
        println!("  Error: {}", error.red());
    }
    for (label, summary) in [
        ("Plan", &mission.plan_summary),
        ("Simulation", &mission.simulation_summary),
        ("Execution", &mission.execution_summary),
    ] {
        if let Some(summary) = summary {
            println!("  {}: {}", label, summary);
        }
    }
    if let Some(duration) = mission.duration() {
        println!("  Duration: {}ms", duration.num_milliseconds());
    }

    println!();
    println!("{}", "Timeline:".bold());
    for entry in mission.timeline() {
        let event = serde_json::to_value(entry.event)
            .ok()
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default();
        let event = match entry.severity {
            Severity::Info => event.normal(),
            Severity::Warning => event.yellow(),
            Severity::Error => event.red(),
        };
        println!(
            "  {}  {:<22} {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            event,
            entry.details.dimmed()
        );
    }
}

async fn delete(engine: &ExecutionEngine, mission_id: String) -> Result<()> {
    let id = MissionId::new(mission_id);
    engine.delete_mission(&id).await?;
    println!("{}", format!("✓ Mission deleted: {}", id).green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_is_case_insensitive() {
        assert_eq!(parse_status("rolled_back"), Ok(MissionStatus::RolledBack));
        assert_eq!(parse_status("FAILED"), Ok(MissionStatus::Failed));
        assert!(parse_status("exploded").is_err());
    }
}
