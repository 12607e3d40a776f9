// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tour execution engine.
//!
//! Drives the `active -> completed | abandoned` lifecycle. Every mutating
//! operation runs under a per-user async lock, and persists through the
//! store's atomic primitives (`insert_active`, revision compare-and-set), so
//! two requests for the same user can never both credit a keypoint or both
//! start a tour.

use crate::db::{ExecutionStore, PositionStore, TourStore};
use crate::error::{AppError, Result};
use crate::models::{CompletedKeypoint, Keypoint, Position, Tour, TourExecution};
use crate::services::locks::KeyedLocks;
use crate::services::proximity::{self, PROXIMITY_RADIUS_METERS};
use chrono::Utc;
use geo::Point;
use std::sync::Arc;

/// The keypoint closest to the user after a check.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestKeypoint {
    pub keypoint_index: u32,
    pub keypoint_name: String,
    pub distance_meters: f64,
}

/// Result of one keypoint check.
#[derive(Debug, Clone)]
pub struct CheckKeypointsOutcome {
    /// A keypoint was credited by this call
    pub near_keypoint: bool,
    pub keypoint_index: Option<u32>,
    pub keypoint_name: Option<String>,
    pub distance_meters: Option<f64>,
    pub completed_keypoint: Option<CompletedKeypoint>,
    /// Keypoints of the tour still to be credited
    pub remaining_keypoints: usize,
    /// Closest keypoint not yet credited, if any remain
    pub nearest_keypoint: Option<NearestKeypoint>,
    pub execution: TourExecution,
}

#[derive(Clone)]
pub struct TourExecutionService {
    positions: Arc<dyn PositionStore>,
    tours: Arc<dyn TourStore>,
    executions: Arc<dyn ExecutionStore>,
    /// Serializes execution changes per user
    user_locks: KeyedLocks<u64>,
}

impl TourExecutionService {
    pub fn new(
        positions: Arc<dyn PositionStore>,
        tours: Arc<dyn TourStore>,
        executions: Arc<dyn ExecutionStore>,
    ) -> Self {
        Self {
            positions,
            tours,
            executions,
            user_locks: KeyedLocks::new(),
        }
    }

    async fn required_position(&self, user_id: u64) -> Result<Position> {
        self.positions.latest_position(user_id).await?.ok_or_else(|| {
            AppError::Precondition("Position required: set your current position first".to_string())
        })
    }

    async fn tour(&self, tour_id: &str) -> Result<Tour> {
        self.tours
            .get_tour(tour_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tour {} not found", tour_id)))
    }

    /// Start walking `tour_id` from the user's current position.
    pub async fn start_execution(&self, user_id: u64, tour_id: &str) -> Result<TourExecution> {
        self.user_locks
            .run(user_id, self.start_locked(user_id, tour_id))
            .await
    }

    async fn start_locked(&self, user_id: u64, tour_id: &str) -> Result<TourExecution> {
        self.tour(tour_id).await?;
        let position = self.required_position(user_id).await?;

        let execution = TourExecution::start(user_id, tour_id.to_string(), position, Utc::now());
        self.executions.insert_active(&execution).await?;

        tracing::info!(
            user_id,
            tour_id,
            execution_id = %execution.id,
            "Tour execution started"
        );
        Ok(execution)
    }

    /// Refresh the active execution's position and credit at most one
    /// keypoint: the first uncompleted one, in catalog order, within range.
    pub async fn check_keypoints(&self, user_id: u64) -> Result<CheckKeypointsOutcome> {
        self.user_locks
            .run(user_id, self.check_locked(user_id))
            .await
    }

    async fn check_locked(&self, user_id: u64) -> Result<CheckKeypointsOutcome> {
        let mut execution = self
            .executions
            .get_active(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No active tour execution".to_string()))?;
        let position = self.required_position(user_id).await?;

        let now = Utc::now();
        let here = Point::new(position.longitude, position.latitude);
        execution.touch(position, now);

        let tour = self.tour(&execution.tour_id).await?;

        let hit = proximity::first_within_radius(
            here,
            &tour.keypoints,
            PROXIMITY_RADIUS_METERS,
            |k| execution.has_completed(k.order),
        )
        .map(|(keypoint, distance)| (keypoint.clone(), distance));

        let mut completed_keypoint = None;
        if let Some((keypoint, distance)) = &hit {
            completed_keypoint = execution.complete_keypoint(keypoint.order, now);
            tracing::info!(
                user_id,
                execution_id = %execution.id,
                keypoint_index = keypoint.order,
                distance_meters = distance,
                "Keypoint completed"
            );
        }

        let remaining = remaining_keypoints(&tour.keypoints, &execution);
        if remaining == 0 && execution.mark_completed(now) {
            tracing::info!(
                user_id,
                execution_id = %execution.id,
                tour_id = %execution.tour_id,
                "Tour completed"
            );
        }

        let nearest = proximity::nearest_keypoint(here, &tour.keypoints, |k| {
            execution.has_completed(k.order)
        })
        .map(|(keypoint, distance)| NearestKeypoint {
            keypoint_index: keypoint.order,
            keypoint_name: keypoint.name.clone(),
            distance_meters: distance,
        });

        let expected = execution.revision;
        execution.revision += 1;
        self.executions
            .update_execution(&execution, expected)
            .await?;

        let (keypoint_index, keypoint_name, distance_meters) = match hit {
            Some((keypoint, distance)) => (Some(keypoint.order), Some(keypoint.name), Some(distance)),
            None => (None, None, None),
        };

        Ok(CheckKeypointsOutcome {
            near_keypoint: completed_keypoint.is_some(),
            keypoint_index,
            keypoint_name,
            distance_meters,
            completed_keypoint,
            remaining_keypoints: remaining,
            nearest_keypoint: nearest,
            execution,
        })
    }

    /// Abandon one of the user's executions. Only an active execution owned
    /// by the user qualifies; anything else is reported as not found.
    pub async fn abandon_execution(&self, user_id: u64, execution_id: &str) -> Result<TourExecution> {
        if uuid::Uuid::parse_str(execution_id).is_err() {
            return Err(AppError::Validation(format!(
                "Invalid execution id: {}",
                execution_id
            )));
        }

        self.user_locks
            .run(user_id, self.abandon_locked(user_id, execution_id))
            .await
    }

    async fn abandon_locked(&self, user_id: u64, execution_id: &str) -> Result<TourExecution> {
        let not_found = || AppError::NotFound("Active tour execution not found".to_string());

        let mut execution = self
            .executions
            .get_execution(execution_id)
            .await?
            .filter(|e| e.user_id == user_id && e.is_active())
            .ok_or_else(not_found)?;

        execution.abandon(Utc::now());
        let expected = execution.revision;
        execution.revision += 1;
        self.executions
            .update_execution(&execution, expected)
            .await?;

        tracing::info!(user_id, execution_id, "Tour execution abandoned");
        Ok(execution)
    }

    /// All of the user's executions, most recently started first.
    pub async fn list_executions(&self, user_id: u64) -> Result<Vec<TourExecution>> {
        self.executions.list_for_user(user_id).await
    }

    pub async fn active_execution(&self, user_id: u64) -> Result<Option<TourExecution>> {
        self.executions.get_active(user_id).await
    }
}

/// Keypoints of the tour not yet credited to the execution.
fn remaining_keypoints(keypoints: &[Keypoint], execution: &TourExecution) -> usize {
    keypoints
        .iter()
        .filter(|k| !execution.has_completed(k.order))
        .count()
}
