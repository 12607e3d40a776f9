// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Tour definitions and their ordered keypoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A fixed waypoint of a tour.
///
/// `order` is the keypoint's identity for completion tracking. It is assigned
/// once when the keypoint is added and never renumbered afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Keypoint {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub order: u32,
}

/// A walkable tour. Read-only from the execution engine's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Tour {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub author_id: u64,
    /// Keypoints in catalog (walking) order
    #[serde(default)]
    pub keypoints: Vec<Keypoint>,
    /// Next `order` to hand out; only ever grows
    #[serde(default)]
    pub next_order: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tour {
    pub fn new(id: String, name: String, description: String, author_id: u64) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            description,
            author_id,
            keypoints: Vec::new(),
            next_order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn total_keypoints(&self) -> usize {
        self.keypoints.len()
    }

    pub fn keypoint(&self, order: u32) -> Option<&Keypoint> {
        self.keypoints.iter().find(|k| k.order == order)
    }

    /// Append a keypoint, assigning it the next stable order.
    pub fn add_keypoint(
        &mut self,
        name: String,
        description: String,
        latitude: f64,
        longitude: f64,
    ) -> Keypoint {
        let keypoint = Keypoint {
            name,
            description,
            latitude,
            longitude,
            order: self.next_order,
        };
        self.next_order += 1;
        self.keypoints.push(keypoint.clone());
        self.updated_at = Utc::now();
        keypoint
    }

    /// Remove a keypoint. Remaining keypoints keep their order values.
    pub fn remove_keypoint(&mut self, order: u32) -> Option<Keypoint> {
        let idx = self.keypoints.iter().position(|k| k.order == order)?;
        self.updated_at = Utc::now();
        Some(self.keypoints.remove(idx))
    }

    /// Restore the `next_order` invariant after loading keypoints with
    /// externally assigned orders.
    pub(crate) fn normalize(&mut self) {
        self.keypoints.sort_by_key(|k| k.order);
        self.keypoints.dedup_by_key(|k| k.order);
        let max_next = self.keypoints.last().map_or(0, |k| k.order + 1);
        self.next_order = self.next_order.max(max_next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tour_with(n: usize) -> Tour {
        let mut tour = Tour::new("t1".into(), "Old Town".into(), String::new(), 3);
        for i in 0..n {
            tour.add_keypoint(format!("KP {}", i), String::new(), 45.0, 19.0 + i as f64);
        }
        tour
    }

    #[test]
    fn test_add_keypoint_assigns_increasing_order() {
        let tour = tour_with(3);
        let orders: Vec<u32> = tour.keypoints.iter().map(|k| k.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(tour.next_order, 3);
    }

    #[test]
    fn test_remove_keypoint_leaves_gap() {
        let mut tour = tour_with(3);
        let removed = tour.remove_keypoint(1).expect("keypoint 1 exists");
        assert_eq!(removed.name, "KP 1");

        let orders: Vec<u32> = tour.keypoints.iter().map(|k| k.order).collect();
        assert_eq!(orders, vec![0, 2]);
        assert_eq!(tour.keypoint(2).map(|k| k.name.as_str()), Some("KP 2"));

        // Orders are never reused.
        let added = tour.add_keypoint("KP new".into(), String::new(), 45.0, 20.0);
        assert_eq!(added.order, 3);
    }

    #[test]
    fn test_remove_missing_keypoint() {
        let mut tour = tour_with(1);
        assert!(tour.remove_keypoint(9).is_none());
        assert_eq!(tour.total_keypoints(), 1);
    }

    #[test]
    fn test_normalize_sorts_and_advances_next_order() {
        let mut tour = tour_with(0);
        for order in [4, 1, 4] {
            tour.keypoints.push(Keypoint {
                name: format!("KP {}", order),
                description: String::new(),
                latitude: 0.0,
                longitude: 0.0,
                order,
            });
        }
        tour.normalize();

        let orders: Vec<u32> = tour.keypoints.iter().map(|k| k.order).collect();
        assert_eq!(orders, vec![1, 4]);
        assert_eq!(tour.next_order, 5);
    }
}
