// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{engine, wait_for_status, wait_idle, wait_terminal, Phase, StubCollaborators};
use convoy_core::application::{EngineError, MissionRequest};
use convoy_core::domain::events::MissionEventType;
use convoy_core::domain::mission::{MissionId, MissionStatus, MissionType, TimelineEvent};
use serde_json::json;

fn deploy() -> MissionRequest {
    MissionRequest::new(MissionType::Deploy).with_target_layers(["compute", "network"])
}

#[tokio::test]
async fn test_execution_failure_rolls_back() {
    let stub = StubCollaborators::new();
    let (engine, _) = engine(&stub);
    engine.start(1).await.unwrap();

    let id = engine
        .submit(
            deploy()
                .with_simulation(true)
                .with_rollback_on_failure(true)
                .with_config("stub.execute", json!("fail:disk full")),
        )
        .await
        .unwrap();

    let mission = wait_terminal(&engine, &id).await;
    assert_eq!(mission.status(), MissionStatus::RolledBack);
    assert_eq!(mission.error.as_deref(), Some("disk full"));

    let events: Vec<TimelineEvent> = mission.timeline().iter().map(|entry| entry.event).collect();
    assert_eq!(
        events,
        vec![
            TimelineEvent::Submitted,
            TimelineEvent::PlanningStarted,
            TimelineEvent::PlanningCompleted,
            TimelineEvent::SimulationStarted,
            TimelineEvent::SimulationCompleted,
            TimelineEvent::ExecutionStarted,
            TimelineEvent::ExecutionFailed,
            TimelineEvent::RollbackStarted,
            TimelineEvent::RollbackCompleted,
        ]
    );
    assert!(mission.rollback_started_at.is_some());
    assert!(mission.rollback_completed_at.is_some());
    assert!(mission.succeeded_at.is_none());
    assert_eq!(stub.calls(Phase::Rollback), vec![id]);

    engine.stop().await;
}

#[tokio::test]
async fn test_simulation_failure_never_rolls_back() {
    let stub = StubCollaborators::new();
    let (engine, _) = engine(&stub);
    engine.start(1).await.unwrap();

    let id = engine
        .submit(
            deploy()
                .with_simulation(true)
                .with_rollback_on_failure(true)
                .with_config("stub.simulate", json!("fail:quota exceeded")),
        )
        .await
        .unwrap();

    let mission = wait_terminal(&engine, &id).await;
    assert_eq!(mission.status(), MissionStatus::Failed);
    assert_eq!(mission.error.as_deref(), Some("quota exceeded"));
    assert_eq!(
        mission.timeline().last().unwrap().event,
        TimelineEvent::SimulationFailed
    );
    assert!(stub.calls(Phase::Execute).is_empty());
    assert!(stub.calls(Phase::Rollback).is_empty());

    engine.stop().await;
}

#[tokio::test]
async fn test_failed_rollback_keeps_execution_error() {
    let stub = StubCollaborators::new();
    let (engine, _) = engine(&stub);
    engine.start(1).await.unwrap();

    let id = engine
        .submit(
            deploy()
                .with_rollback_on_failure(true)
                .with_config("stub.execute", json!("fail:disk full"))
                .with_config("stub.rollback", json!("fail:snapshot missing")),
        )
        .await
        .unwrap();

    let mission = wait_terminal(&engine, &id).await;
    assert_eq!(mission.status(), MissionStatus::Failed);
    assert_eq!(mission.error.as_deref(), Some("disk full"));

    let last = mission.timeline().last().unwrap();
    assert_eq!(last.event, TimelineEvent::RollbackFailed);
    assert_eq!(last.details, "snapshot missing");

    engine.stop().await;
}

#[tokio::test]
async fn test_execution_failure_without_rollback() {
    let stub = StubCollaborators::new();
    let (engine, _) = engine(&stub);
    engine.start(1).await.unwrap();

    let id = engine
        .submit(deploy().with_config("stub.execute", json!("fail:image pull backoff")))
        .await
        .unwrap();

    let mission = wait_terminal(&engine, &id).await;
    assert_eq!(mission.status(), MissionStatus::Failed);
    assert_eq!(mission.error.as_deref(), Some("image pull backoff"));
    assert_eq!(
        mission.timeline().last().unwrap().event,
        TimelineEvent::ExecutionFailed
    );
    assert!(stub.calls(Phase::Rollback).is_empty());

    engine.stop().await;
}

#[tokio::test]
async fn test_successful_mission_collects_phase_results() {
    let stub = StubCollaborators::new();
    let (engine, _) = engine(&stub);
    engine.start(2).await.unwrap();

    let id = engine.submit(deploy().with_simulation(true)).await.unwrap();
    let mission = wait_terminal(&engine, &id).await;

    assert_eq!(mission.status(), MissionStatus::Succeeded);
    assert_eq!(mission.plan_summary.as_deref(), Some("planned"));
    assert_eq!(mission.simulation_summary.as_deref(), Some("simulated"));
    assert_eq!(mission.execution_summary.as_deref(), Some("executed"));
    assert_eq!(mission.capsules, vec!["capsule-a".to_string()]);
    // Execution's layers replace the simulation's.
    assert_eq!(mission.layers, vec!["compute".to_string(), "network".to_string()]);
    assert!(mission.error.is_none());
    assert!(mission.duration().is_some());

    engine.stop().await;
}

#[tokio::test]
async fn test_priority_then_submission_order() {
    let stub = StubCollaborators::with_plan_gate();
    let (engine, _) = engine(&stub);
    engine.start(1).await.unwrap();

    let first = engine.submit(deploy().with_priority(1)).await.unwrap();
    let low = engine.submit(deploy().with_priority(5)).await.unwrap();
    let second = engine.submit(deploy().with_priority(1)).await.unwrap();

    stub.open_plan_gate();
    for id in [&first, &low, &second] {
        wait_terminal(&engine, id).await;
    }

    assert_eq!(stub.calls(Phase::Plan), vec![first, second, low]);
    engine.stop().await;
}

#[tokio::test]
async fn test_lifecycle_events_in_order() {
    let stub = StubCollaborators::new();
    let (engine, _) = engine(&stub);
    engine.start(1).await.unwrap();

    let succeeded = Arc::new(AtomicUsize::new(0));
    let counter = succeeded.clone();
    let subscription = engine
        .subscribe("mission.succeeded", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let id = MissionId::new("events-1");
    let mut stream = engine.mission_stream(id.clone());
    engine
        .submit(deploy().with_id("events-1").with_simulation(true))
        .await
        .unwrap();

    let mut seen = Vec::new();
    loop {
        let event = stream.recv().await.unwrap();
        seen.push(event.event_type);
        if event.status.is_terminal() {
            break;
        }
    }
    assert_eq!(
        seen,
        vec![
            MissionEventType::Submitted,
            MissionEventType::Planning,
            MissionEventType::Planned,
            MissionEventType::Simulating,
            MissionEventType::Simulated,
            MissionEventType::Executing,
            MissionEventType::Succeeded,
        ]
    );
    assert_eq!(succeeded.load(Ordering::SeqCst), 1);

    assert!(engine.unsubscribe(subscription));
    assert!(engine.subscribe("deployment.done", |_| {}).is_err());
    engine.stop().await;
}

#[tokio::test]
async fn test_submit_requires_running_engine() {
    let stub = StubCollaborators::new();
    let (engine, _) = engine(&stub);

    assert!(matches!(
        engine.submit(deploy()).await,
        Err(EngineError::NotRunning)
    ));

    engine.start(1).await.unwrap();
    engine.stop().await;
    assert!(matches!(
        engine.submit(deploy()).await,
        Err(EngineError::NotRunning)
    ));
}

#[tokio::test]
async fn test_submit_validation_and_duplicates() {
    let stub = StubCollaborators::new();
    let (engine, _) = engine(&stub);
    engine.start(1).await.unwrap();

    tokio_test::assert_ok!(engine.submit(deploy().with_id("deploy-1")).await);
    assert!(matches!(
        engine.submit(deploy().with_id("deploy-1")).await,
        Err(EngineError::DuplicateMission(_))
    ));
    assert!(matches!(
        engine
            .submit(MissionRequest::new(MissionType::Scale))
            .await,
        Err(EngineError::InvalidMission(_))
    ));
    assert!(matches!(
        engine.submit(deploy().with_priority(-3)).await,
        Err(EngineError::InvalidMission(_))
    ));

    engine.stop().await;
}

#[tokio::test]
async fn test_start_and_stop_are_idempotent() {
    let stub = StubCollaborators::new();
    let (engine, _) = engine(&stub);

    engine.stop().await;
    engine.start(2).await.unwrap();
    engine.start(5).await.unwrap();
    assert_eq!(engine.get_status().await.worker_count, 2);

    engine.stop().await;
    engine.stop().await;
    assert!(!engine.is_running());

    engine.start(1).await.unwrap();
    let id = engine.submit(deploy()).await.unwrap();
    assert_eq!(
        wait_terminal(&engine, &id).await.status(),
        MissionStatus::Succeeded
    );
    engine.stop().await;
}

#[tokio::test]
async fn test_graceful_shutdown_leaves_no_orphans() {
    let stub = StubCollaborators::new();
    let (engine, _) = engine(&stub);
    engine.start(2).await.unwrap();

    let mut ids = Vec::new();
    for _ in 0..10 {
        ids.push(engine.submit(deploy().with_simulation(true)).await.unwrap());
    }
    engine.stop().await;

    let status = engine.get_status().await;
    assert!(!status.is_running);
    assert_eq!(status.active_mission_count, 0);
    for id in &ids {
        let mission = engine.get_mission(id).await.unwrap();
        assert!(
            mission.is_terminal() || mission.status() == MissionStatus::Pending,
            "mission {} left in {}",
            id,
            mission.status()
        );
    }

    // Whatever was still queued runs on the next start.
    engine.start(2).await.unwrap();
    for id in &ids {
        assert_eq!(
            wait_terminal(&engine, id).await.status(),
            MissionStatus::Succeeded
        );
    }
    engine.stop().await;
}

#[tokio::test]
async fn test_rollback_submits_new_mission() {
    let stub = StubCollaborators::new();
    let (engine, _) = engine(&stub);
    engine.start(1).await.unwrap();

    let original_id = engine.submit(deploy()).await.unwrap();
    let original = wait_terminal(&engine, &original_id).await;
    assert_eq!(original.status(), MissionStatus::Succeeded);

    let rollback_id = engine.rollback(&original_id).await.unwrap();
    assert_ne!(rollback_id, original_id);

    let rollback = wait_terminal(&engine, &rollback_id).await;
    assert_eq!(rollback.mission_type, MissionType::Rollback);
    assert_eq!(rollback.priority, 0);
    assert!(!rollback.rollback_on_failure);
    assert_eq!(rollback.target_layers, original.target_layers);
    assert_eq!(
        rollback.configuration["original_mission_id"],
        json!(original_id.as_str())
    );
    assert_eq!(rollback.configuration["original_mission_type"], json!("deploy"));

    // The original record is untouched.
    let after = engine.get_mission(&original_id).await.unwrap();
    assert_eq!(after, original);

    engine.stop().await;
}

#[tokio::test]
async fn test_rollback_rejects_unfinished_or_unknown_missions() {
    let stub = StubCollaborators::with_plan_gate();
    let (engine, _) = engine(&stub);
    engine.start(1).await.unwrap();

    let busy = engine.submit(deploy()).await.unwrap();
    wait_for_status(&engine, &busy, MissionStatus::Planning).await;
    let queued = engine.submit(deploy()).await.unwrap();

    assert!(matches!(
        engine.rollback(&busy).await,
        Err(EngineError::InvalidState { .. })
    ));
    assert!(matches!(
        engine.rollback(&queued).await,
        Err(EngineError::InvalidState { .. })
    ));
    assert!(matches!(
        engine.rollback(&MissionId::new("missing")).await,
        Err(EngineError::MissionNotFound(_))
    ));

    stub.open_plan_gate();
    wait_idle(&engine).await;
    engine.stop().await;
}

#[tokio::test]
async fn test_query_and_delete() {
    let stub = StubCollaborators::new();
    let (engine, _) = engine(&stub);
    engine.start(1).await.unwrap();

    let ok = engine.submit(deploy()).await.unwrap();
    let bad = engine
        .submit(deploy().with_config("stub.plan", json!("fail:no capacity")))
        .await
        .unwrap();
    wait_terminal(&engine, &ok).await;
    wait_terminal(&engine, &bad).await;

    let failed = engine
        .get_missions(Some(MissionStatus::Failed), 10, 0)
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].mission_id, bad);
    assert_eq!(engine.get_missions(None, 10, 0).await.unwrap().len(), 2);

    engine.delete_mission(&bad).await.unwrap();
    assert!(matches!(
        engine.get_mission(&bad).await,
        Err(EngineError::MissionNotFound(_))
    ));
    assert_eq!(engine.get_missions(None, 10, 0).await.unwrap().len(), 1);

    engine.stop().await;
}
