// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running and
//! FIRESTORE_EMULATOR_HOST to point at it. They are skipped otherwise.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tour_tracker::db::{collections, ExecutionStore, FirestoreDb, PositionStore, TourStore};
use tour_tracker::error::AppError;
use tour_tracker::models::{Position, TourExecution};
use tour_tracker::services::TourExecutionService;

mod common;
use common::{test_db, test_tour};

/// Generate a unique user ID for test isolation.
fn unique_user_id() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
        % 1_000_000_000_000
}

// ═══════════════════════════════════════════════════════════════════════════
// POSITION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_position_upsert_and_clear() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    assert!(db.latest_position(user_id).await.unwrap().is_none());

    db.put_position(&Position::new(user_id, 1.0, 2.0, None))
        .await
        .unwrap();
    db.put_position(&Position::new(user_id, 3.0, 4.0, Some(5.0)))
        .await
        .unwrap();

    let latest = db.latest_position(user_id).await.unwrap().unwrap();
    assert_eq!((latest.latitude, latest.longitude), (3.0, 4.0));
    assert_eq!(latest.accuracy, Some(5.0));

    assert_eq!(db.clear_positions(user_id).await.unwrap(), 1);
    assert_eq!(db.clear_positions(user_id).await.unwrap(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// EXECUTION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_active_slot_is_exclusive() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();
    let position = Position::new(user_id, 0.0, 0.0, None);

    let first = TourExecution::start(user_id, "t".into(), position.clone(), Utc::now());
    db.insert_active(&first).await.unwrap();

    let second = TourExecution::start(user_id, "t".into(), position, Utc::now());
    let err = db.insert_active(&second).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let active = db.get_active(user_id).await.unwrap().unwrap();
    assert_eq!(active.id, first.id);
}

#[tokio::test]
async fn test_revision_compare_and_set() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();
    let mut exec = TourExecution::start(
        user_id,
        "t".into(),
        Position::new(user_id, 0.0, 0.0, None),
        Utc::now(),
    );
    db.insert_active(&exec).await.unwrap();

    exec.revision = 1;
    db.update_execution(&exec, 0).await.unwrap();

    let err = db.update_execution(&exec, 0).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    exec.abandon(Utc::now());
    exec.revision = 2;
    db.update_execution(&exec, 1).await.unwrap();
    assert!(db.get_active(user_id).await.unwrap().is_none());

    let listed = db.list_for_user(user_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].revision, 2);
}

#[tokio::test]
async fn test_engine_on_firestore() {
    require_emulator!();

    let db = Arc::new(test_db().await);
    let user_id = unique_user_id();
    let mut tour = test_tour();
    tour.id = format!("tour-{}", user_id);
    db.save_tour(&tour).await.unwrap();

    let (lat, lng) = (tour.keypoints[0].latitude, tour.keypoints[0].longitude);
    db.put_position(&Position::new(user_id, lat, lng, None))
        .await
        .unwrap();

    let engine = TourExecutionService::new(db.clone(), db.clone(), db.clone());
    let started = engine.start_execution(user_id, &tour.id).await.unwrap();

    let outcome = engine.check_keypoints(user_id).await.unwrap();
    assert!(outcome.near_keypoint);
    assert_eq!(outcome.execution.id, started.id);
    assert_eq!(outcome.remaining_keypoints, 1);

    engine.abandon_execution(user_id, &started.id).await.unwrap();
    assert!(engine.active_execution(user_id).await.unwrap().is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// ACTIVE SLOT TESTS
// ═══════════════════════════════════════════════════════════════════════════

/// Same shape as the stored slot document.
#[derive(Serialize, Deserialize)]
struct SlotDoc {
    user_id: u64,
    execution_id: String,
}

/// Write a slot document directly, bypassing the store.
async fn write_slot(db: &FirestoreDb, user_id: u64, execution_id: &str) {
    let _: () = db
        .get_client()
        .unwrap()
        .fluent()
        .update()
        .in_col(collections::ACTIVE_EXECUTIONS)
        .document_id(user_id.to_string())
        .object(&SlotDoc {
            user_id,
            execution_id: execution_id.to_string(),
        })
        .execute()
        .await
        .unwrap();
}

/// Write an execution record directly, bypassing the store.
async fn write_execution(db: &FirestoreDb, execution: &TourExecution) {
    let _: () = db
        .get_client()
        .unwrap()
        .fluent()
        .update()
        .in_col(collections::TOUR_EXECUTIONS)
        .document_id(&execution.id)
        .object(execution)
        .execute()
        .await
        .unwrap();
}

fn new_execution(user_id: u64) -> TourExecution {
    TourExecution::start(
        user_id,
        "t".into(),
        Position::new(user_id, 0.0, 0.0, None),
        Utc::now(),
    )
}

#[tokio::test]
async fn test_slot_of_finished_execution_is_reclaimed() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    let mut stale = new_execution(user_id);
    stale.abandon(Utc::now());
    write_execution(&db, &stale).await;
    write_slot(&db, user_id, &stale.id).await;

    let fresh = new_execution(user_id);
    db.insert_active(&fresh).await.unwrap();
    assert_eq!(db.get_active(user_id).await.unwrap().unwrap().id, fresh.id);

    // The reclaimed slot is exclusive again.
    let err = db.insert_active(&new_execution(user_id)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_slot_with_unreadable_holder_is_not_reclaimed() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();
    write_slot(&db, user_id, "00000000-0000-4000-8000-000000000000").await;

    let err = db.insert_active(&new_execution(user_id)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(db.list_for_user(user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_finishing_an_orphan_keeps_the_current_slot() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    let current = new_execution(user_id);
    db.insert_active(&current).await.unwrap();

    // An active record the slot does not name.
    let mut orphan = new_execution(user_id);
    write_execution(&db, &orphan).await;

    orphan.abandon(Utc::now());
    orphan.revision = 1;
    db.update_execution(&orphan, 0).await.unwrap();

    assert_eq!(db.get_active(user_id).await.unwrap().unwrap().id, current.id);
    let err = db.insert_active(&new_execution(user_id)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}
