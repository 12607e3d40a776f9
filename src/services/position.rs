// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Position store service: validated writes and "current location" reads.

use crate::db::PositionStore;
use crate::error::{AppError, Result};
use crate::models::position::valid_coordinates;
use crate::models::Position;
use std::sync::Arc;

#[derive(Clone)]
pub struct PositionService {
    store: Arc<dyn PositionStore>,
}

impl PositionService {
    pub fn new(store: Arc<dyn PositionStore>) -> Self {
        Self { store }
    }

    /// Record the user's current location, stamped with the call time.
    pub async fn set_position(
        &self,
        user_id: u64,
        latitude: f64,
        longitude: f64,
        accuracy: Option<f64>,
    ) -> Result<Position> {
        if !valid_coordinates(latitude, longitude) {
            return Err(AppError::Validation(format!(
                "Coordinates out of range: latitude {} must be within [-90, 90], longitude {} within [-180, 180]",
                latitude, longitude
            )));
        }
        if accuracy.is_some_and(|a| !a.is_finite() || a < 0.0) {
            return Err(AppError::Validation(
                "Accuracy must be a non-negative number of meters".to_string(),
            ));
        }

        let position = Position::new(user_id, latitude, longitude, accuracy);
        self.store.put_position(&position).await?;

        tracing::debug!(
            user_id,
            latitude,
            longitude,
            position_id = %position.id,
            "Position updated"
        );
        Ok(position)
    }

    /// The user's most recent position.
    pub async fn current_position(&self, user_id: u64) -> Result<Position> {
        self.store
            .latest_position(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Position not found for user {}", user_id)))
    }

    /// Like `current_position`, but `None` instead of an error when unknown.
    pub async fn find_current_position(&self, user_id: u64) -> Result<Option<Position>> {
        self.store.latest_position(user_id).await
    }

    /// Remove all stored positions for the user. Clearing nothing is not an error.
    pub async fn clear_position(&self, user_id: u64) -> Result<u64> {
        let removed = self.store.clear_positions(user_id).await?;
        tracing::info!(user_id, removed, "Position cleared");
        Ok(removed)
    }

    /// Latest position of every user, newest first.
    pub async fn all_positions(&self) -> Result<Vec<Position>> {
        self.store.all_latest_positions().await
    }
}
