// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage interfaces shared by all backends.
//!
//! Services hold these as `Arc<dyn _>` handles built once at startup.

use crate::error::AppError;
use crate::models::{Position, Tour, TourExecution};
use async_trait::async_trait;

/// Latest known location per user.
///
/// # Implementations
///
/// - `MemoryDb`: process-local maps
/// - `FirestoreDb`: one document per user in `positions`
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Store `position` as the user's current fix.
    async fn put_position(&self, position: &Position) -> Result<(), AppError>;

    /// Most recent fix for the user, if any.
    async fn latest_position(&self, user_id: u64) -> Result<Option<Position>, AppError>;

    /// Remove every stored fix for the user. Returns how many were removed.
    async fn clear_positions(&self, user_id: u64) -> Result<u64, AppError>;

    /// Latest fix of every user, newest first.
    async fn all_latest_positions(&self) -> Result<Vec<Position>, AppError>;
}

/// Tour definitions.
#[async_trait]
pub trait TourStore: Send + Sync {
    async fn get_tour(&self, tour_id: &str) -> Result<Option<Tour>, AppError>;

    async fn list_tours(&self) -> Result<Vec<Tour>, AppError>;

    /// Create or replace a tour.
    async fn save_tour(&self, tour: &Tour) -> Result<(), AppError>;
}

/// Tour execution records.
///
/// The two write paths are atomic per record:
/// - `insert_active` checks for an existing active execution and inserts
///   the new one as a single unit.
/// - `update_execution` is a compare-and-set on `revision`.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Insert a new active execution.
    ///
    /// Fails with `AppError::Conflict` if the user already owns an active one.
    async fn insert_active(&self, execution: &TourExecution) -> Result<(), AppError>;

    async fn get_execution(&self, execution_id: &str) -> Result<Option<TourExecution>, AppError>;

    /// The user's active execution, if any.
    async fn get_active(&self, user_id: u64) -> Result<Option<TourExecution>, AppError>;

    /// Persist `execution` if the stored record is still active and at
    /// `expected_revision`. The caller advances `execution.revision` past
    /// `expected_revision` before calling.
    ///
    /// Fails with `AppError::Conflict` and writes nothing otherwise.
    async fn update_execution(
        &self,
        execution: &TourExecution,
        expected_revision: u64,
    ) -> Result<(), AppError>;

    /// All executions for the user, most recently started first.
    /// Records that cannot be decoded are skipped.
    async fn list_for_user(&self, user_id: u64) -> Result<Vec<TourExecution>, AppError>;
}
