// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Run a batch of missions on an embedded engine
//!
//! Uses the dry-run collaborators, so nothing outside the mission store is
//! touched. Failures can be rehearsed per mission with the
//! `dry_run.fail_phase` configuration key.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use convoy_core::application::{ExecutionEngine, MissionRequest};
use convoy_core::domain::engine_config::EngineConfigManifest;
use convoy_core::domain::mission::{Mission, MissionId};
use convoy_core::infrastructure::collaborators::dry_run_collaborators;

use super::paint_status;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Args)]
pub struct RunArgs {
    /// Mission manifest (YAML with a top-level `missions:` list)
    #[arg(value_name = "MISSIONS")]
    pub manifest: PathBuf,

    /// Worker count (default: spec.engine.worker_count)
    #[arg(short, long)]
    pub workers: Option<usize>,
}

/// File format accepted by `convoy run`.
#[derive(Debug, Deserialize)]
pub struct MissionManifest {
    pub missions: Vec<MissionRequest>,
}

impl MissionManifest {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mission manifest {:?}", path))?;
        let manifest: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse mission manifest {:?}", path))?;
        if manifest.missions.is_empty() {
            anyhow::bail!("Mission manifest {:?} contains no missions", path);
        }
        Ok(manifest)
    }
}

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = EngineConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    let manifest = MissionManifest::from_yaml_file(&args.manifest)?;

    let engine = ExecutionEngine::from_config(&config, dry_run_collaborators())
        .await
        .context("Failed to open mission store")?;
    let workers = args.workers.unwrap_or(config.spec.engine.worker_count);
    engine.start(workers).await?;

    let mut submitted = Vec::with_capacity(manifest.missions.len());
    for request in manifest.missions {
        match engine.submit(request).await {
            Ok(id) => {
                println!("{} {}", "→ submitted".cyan(), id);
                submitted.push(id);
            }
            Err(e) => warn!("Mission rejected: {}", e),
        }
    }

    info!(count = submitted.len(), workers, "Waiting for missions to finish");
    let interrupted = tokio::select! {
        result = wait_for_terminal(&engine, &submitted) => {
            result?;
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };

    engine.stop().await;
    if interrupted {
        println!("{}", "Interrupted; unfinished missions stay in the store".yellow());
    }

    let mut missions = Vec::with_capacity(submitted.len());
    for id in &submitted {
        missions.push(engine.get_mission(id).await?);
    }
    print_summary(&missions);

    if missions.iter().any(|m| !m.is_terminal()) {
        std::process::exit(2);
    }
    Ok(())
}

async fn wait_for_terminal(engine: &ExecutionEngine, ids: &[MissionId]) -> Result<()> {
    let mut pending: HashSet<MissionId> = ids.iter().cloned().collect();
    let mut tick = tokio::time::interval(POLL_INTERVAL);

    while !pending.is_empty() {
        tick.tick().await;
        let mut finished = Vec::new();
        for id in &pending {
            let mission = engine.get_mission(id).await?;
            if mission.is_terminal() {
                println!(
                    "{} {} {}",
                    "✓".bold(),
                    mission.mission_id,
                    paint_status(mission.status())
                );
                finished.push(id.clone());
            }
        }
        for id in finished {
            pending.remove(&id);
        }
    }
    Ok(())
}

fn print_summary(missions: &[Mission]) {
    println!();
    println!("{}", "Summary:".bold());
    for mission in missions {
        let duration = mission
            .duration()
            .map(|d| format!("{}ms", d.num_milliseconds()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<40} {:<16} {:<14} {:>8}",
            mission.mission_id.as_str(),
            mission.mission_type.as_str(),
            paint_status(mission.status()),
            duration
        );
        if let Some(error) = &mission.error {
            println!("    {} {}", "error:".red(), error);
        }
    }
}
