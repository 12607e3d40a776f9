// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process storage backend.
//!
//! Used for local development and tests. Atomicity comes from dashmap's
//! per-shard locks: the active-execution index entry is held while a new
//! execution is inserted, and compare-and-set updates happen under the
//! record's write guard.

use crate::db::store::{ExecutionStore, PositionStore, TourStore};
use crate::error::AppError;
use crate::models::{Position, Tour, TourExecution};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Fixes kept per user. Older ones are dropped first.
const POSITION_HISTORY_LIMIT: usize = 100;

#[derive(Clone, Default)]
pub struct MemoryDb {
    positions: Arc<DashMap<u64, Vec<Position>>>,
    tours: Arc<DashMap<String, Tour>>,
    executions: Arc<DashMap<String, TourExecution>>,
    /// user_id -> id of that user's active execution
    active: Arc<DashMap<u64, String>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fixes currently held for a user.
    pub fn position_history_len(&self, user_id: u64) -> usize {
        self.positions.get(&user_id).map_or(0, |h| h.len())
    }
}

#[async_trait]
impl PositionStore for MemoryDb {
    async fn put_position(&self, position: &Position) -> Result<(), AppError> {
        let mut history = self.positions.entry(position.user_id).or_default();
        history.push(position.clone());
        if history.len() > POSITION_HISTORY_LIMIT {
            let excess = history.len() - POSITION_HISTORY_LIMIT;
            history.drain(..excess);
        }
        Ok(())
    }

    async fn latest_position(&self, user_id: u64) -> Result<Option<Position>, AppError> {
        Ok(self
            .positions
            .get(&user_id)
            .and_then(|history| history.iter().max_by_key(|p| p.timestamp).cloned()))
    }

    async fn clear_positions(&self, user_id: u64) -> Result<u64, AppError> {
        Ok(self
            .positions
            .remove(&user_id)
            .map_or(0, |(_, history)| history.len() as u64))
    }

    async fn all_latest_positions(&self) -> Result<Vec<Position>, AppError> {
        let mut latest: Vec<Position> = self
            .positions
            .iter()
            .filter_map(|history| history.iter().max_by_key(|p| p.timestamp).cloned())
            .collect();
        latest.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(latest)
    }
}

#[async_trait]
impl TourStore for MemoryDb {
    async fn get_tour(&self, tour_id: &str) -> Result<Option<Tour>, AppError> {
        Ok(self.tours.get(tour_id).map(|t| t.clone()))
    }

    async fn list_tours(&self) -> Result<Vec<Tour>, AppError> {
        let mut tours: Vec<Tour> = self.tours.iter().map(|t| t.clone()).collect();
        tours.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tours)
    }

    async fn save_tour(&self, tour: &Tour) -> Result<(), AppError> {
        self.tours.insert(tour.id.clone(), tour.clone());
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for MemoryDb {
    async fn insert_active(&self, execution: &TourExecution) -> Result<(), AppError> {
        match self.active.entry(execution.user_id) {
            Entry::Occupied(mut slot) => {
                let still_active = self
                    .executions
                    .get(slot.get())
                    .is_some_and(|existing| existing.is_active());
                if still_active {
                    return Err(AppError::Conflict(format!(
                        "User {} already has an active tour",
                        execution.user_id
                    )));
                }
                // Stale index entry left by a completion that raced us.
                self.executions
                    .insert(execution.id.clone(), execution.clone());
                slot.insert(execution.id.clone());
            }
            Entry::Vacant(slot) => {
                self.executions
                    .insert(execution.id.clone(), execution.clone());
                slot.insert(execution.id.clone());
            }
        }
        Ok(())
    }

    async fn get_execution(&self, execution_id: &str) -> Result<Option<TourExecution>, AppError> {
        Ok(self.executions.get(execution_id).map(|e| e.clone()))
    }

    async fn get_active(&self, user_id: u64) -> Result<Option<TourExecution>, AppError> {
        let Some(execution_id) = self.active.get(&user_id).map(|id| id.clone()) else {
            return Ok(None);
        };
        Ok(self
            .executions
            .get(&execution_id)
            .filter(|e| e.is_active())
            .map(|e| e.clone()))
    }

    async fn update_execution(
        &self,
        execution: &TourExecution,
        expected_revision: u64,
    ) -> Result<(), AppError> {
        {
            let mut stored = self.executions.get_mut(&execution.id).ok_or_else(|| {
                AppError::NotFound(format!("Tour execution {} not found", execution.id))
            })?;

            if !stored.is_active() || stored.revision != expected_revision {
                return Err(AppError::Conflict(format!(
                    "Tour execution {} was modified concurrently",
                    execution.id
                )));
            }

            *stored = execution.clone();
        }

        if !execution.is_active() {
            self.active
                .remove_if(&execution.user_id, |_, id| *id == execution.id);
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: u64) -> Result<Vec<TourExecution>, AppError> {
        let mut executions: Vec<TourExecution> = self
            .executions
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.clone())
            .collect();
        executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(executions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn active_execution(user_id: u64) -> TourExecution {
        let position = Position::new(user_id, 45.0, 19.0, None);
        TourExecution::start(user_id, "tour-1".into(), position, Utc::now())
    }

    #[tokio::test]
    async fn test_latest_position_wins_by_timestamp() {
        let db = MemoryDb::new();
        let mut older = Position::new(5, 1.0, 1.0, None);
        older.timestamp = Utc::now() - Duration::seconds(30);
        let newer = Position::new(5, 2.0, 2.0, None);

        // Insert out of order; lookup still returns the newest fix.
        db.put_position(&newer).await.unwrap();
        db.put_position(&older).await.unwrap();

        let latest = db.latest_position(5).await.unwrap().unwrap();
        assert_eq!(latest.latitude, 2.0);
        assert_eq!(db.position_history_len(5), 2);
    }

    #[tokio::test]
    async fn test_position_history_is_bounded() {
        let db = MemoryDb::new();
        for i in 0..(POSITION_HISTORY_LIMIT + 10) {
            db.put_position(&Position::new(9, i as f64 / 1000.0, 0.0, None))
                .await
                .unwrap();
        }
        assert_eq!(db.position_history_len(9), POSITION_HISTORY_LIMIT);
        assert_eq!(
            db.clear_positions(9).await.unwrap(),
            POSITION_HISTORY_LIMIT as u64
        );
        assert_eq!(db.clear_positions(9).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_active_rejects_second_active() {
        let db = MemoryDb::new();
        db.insert_active(&active_execution(1)).await.unwrap();

        let err = db.insert_active(&active_execution(1)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Other users are unaffected.
        db.insert_active(&active_execution(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_requires_matching_revision() {
        let db = MemoryDb::new();
        let mut exec = active_execution(3);
        db.insert_active(&exec).await.unwrap();

        exec.revision = 1;
        db.update_execution(&exec, 0).await.unwrap();

        // A writer that loaded revision 0 loses.
        let mut stale = exec.clone();
        stale.revision = 1;
        let err = db.update_execution(&stale, 0).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_terminal_update_frees_active_slot() {
        let db = MemoryDb::new();
        let mut exec = active_execution(4);
        db.insert_active(&exec).await.unwrap();

        exec.abandon(Utc::now());
        exec.revision = 1;
        db.update_execution(&exec, 0).await.unwrap();

        assert!(db.get_active(4).await.unwrap().is_none());
        db.insert_active(&active_execution(4)).await.unwrap();

        // Terminal records never accept further writes.
        exec.revision = 2;
        assert!(db.update_execution(&exec, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_list_for_user_newest_first() {
        let db = MemoryDb::new();
        let mut first = active_execution(6);
        first.started_at = Utc::now() - Duration::hours(2);
        first.abandon(Utc::now());
        db.executions.insert(first.id.clone(), first.clone());

        let second = active_execution(6);
        db.insert_active(&second).await.unwrap();
        db.insert_active(&active_execution(7)).await.unwrap();

        let listed = db.list_for_user(6).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    }
}
