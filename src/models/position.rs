// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Reported user location.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A location fix reported by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Position {
    /// Generated identity of this fix
    pub id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub user_id: u64,
    /// Degrees, [-90, 90]
    pub latitude: f64,
    /// Degrees, [-180, 180]
    pub longitude: f64,
    /// When the fix was stored
    pub timestamp: DateTime<Utc>,
    /// Reported accuracy radius in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl Position {
    pub fn new(user_id: u64, latitude: f64, longitude: f64, accuracy: Option<f64>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            latitude,
            longitude,
            timestamp: Utc::now(),
            accuracy,
        }
    }
}

/// Whether a latitude/longitude pair lies on the globe.
pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_coordinates_bounds_inclusive() {
        assert!(valid_coordinates(90.0, 180.0));
        assert!(valid_coordinates(-90.0, -180.0));
        assert!(valid_coordinates(0.0, 0.0));
    }

    #[test]
    fn test_valid_coordinates_rejects_out_of_range_and_nan() {
        assert!(!valid_coordinates(90.0001, 0.0));
        assert!(!valid_coordinates(0.0, -180.5));
        assert!(!valid_coordinates(f64::NAN, 0.0));
        assert!(!valid_coordinates(0.0, f64::INFINITY));
    }

    #[test]
    fn test_accuracy_omitted_when_absent() {
        let position = Position::new(7, 45.25, 19.84, None);
        let json = serde_json::to_value(&position).unwrap();
        assert!(json.get("accuracy").is_none());
        assert_eq!(json["user_id"], 7);
    }
}
