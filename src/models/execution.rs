// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Tour execution record and its lifecycle.

use crate::models::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Lifecycle state. `Completed` and `Abandoned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ExecutionStatus {
    Active,
    Completed,
    Abandoned,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Active => "active",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Abandoned => "abandoned",
        }
    }
}

/// A keypoint credited to an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CompletedKeypoint {
    /// The keypoint's `order`
    pub keypoint_index: u32,
    pub completed_at: DateTime<Utc>,
    /// Where the user was when it was credited
    pub latitude: f64,
    pub longitude: f64,
}

/// One user's attempt at walking a tour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TourExecution {
    pub id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub user_id: u64,
    pub tour_id: String,
    pub status: ExecutionStatus,
    /// Last position snapshot taken from the position store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_position: Option<Position>,
    #[serde(default)]
    pub completed_keypoints: Vec<CompletedKeypoint>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abandoned_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    /// Bumped on every persisted change; used for compare-and-set writes.
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub revision: u64,
}

impl TourExecution {
    /// A fresh active execution starting at `position`.
    pub fn start(user_id: u64, tour_id: String, position: Position, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            tour_id,
            status: ExecutionStatus::Active,
            current_position: Some(position),
            completed_keypoints: Vec::new(),
            started_at: now,
            completed_at: None,
            abandoned_at: None,
            last_activity: now,
            revision: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ExecutionStatus::Active
    }

    pub fn has_completed(&self, keypoint_index: u32) -> bool {
        self.completed_keypoints
            .iter()
            .any(|c| c.keypoint_index == keypoint_index)
    }

    /// Refresh the position snapshot and activity timestamp.
    pub fn touch(&mut self, position: Position, now: DateTime<Utc>) {
        self.current_position = Some(position);
        self.last_activity = now;
    }

    /// Credit a keypoint at the user's current position.
    ///
    /// Returns `None` (and changes nothing) if the keypoint was already
    /// credited or there is no position snapshot.
    pub fn complete_keypoint(
        &mut self,
        keypoint_index: u32,
        now: DateTime<Utc>,
    ) -> Option<CompletedKeypoint> {
        if self.has_completed(keypoint_index) {
            return None;
        }
        let position = self.current_position.as_ref()?;
        let completed = CompletedKeypoint {
            keypoint_index,
            completed_at: now,
            latitude: position.latitude,
            longitude: position.longitude,
        };
        self.completed_keypoints.push(completed.clone());
        Some(completed)
    }

    /// Transition `active -> completed`. No-op for terminal states.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(now);
        true
    }

    /// Transition `active -> abandoned`. No-op for terminal states.
    pub fn abandon(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.status = ExecutionStatus::Abandoned;
        self.abandoned_at = Some(now);
        self.last_activity = now;
        true
    }
}
