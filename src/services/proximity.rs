// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Great-circle distance and keypoint proximity.
//!
//! Pure functions, no I/O. Distances use the Haversine formula on a sphere
//! of radius 6371 km and stay in `f64` until compared against a radius.

use crate::models::Keypoint;
use geo::Point;

/// Mean Earth radius used for all distance calculations.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance within which a keypoint counts as visited.
pub const PROXIMITY_RADIUS_METERS: f64 = 50.0;

/// Haversine distance in meters between two lat/lon pairs (degrees).
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c * 1000.0
}

/// Distance in meters between two `geo` points (x = longitude, y = latitude).
pub fn distance_between(a: Point<f64>, b: Point<f64>) -> f64 {
    distance_meters(a.y(), a.x(), b.y(), b.x())
}

/// Location of a keypoint as a `geo` point.
pub fn keypoint_point(keypoint: &Keypoint) -> Point<f64> {
    Point::new(keypoint.longitude, keypoint.latitude)
}

/// First keypoint in iteration order within `radius_meters` of `at`.
///
/// Keypoints rejected by `skip` are ignored. The first match wins even if a
/// later keypoint is closer.
pub fn first_within_radius<'a, I, F>(
    at: Point<f64>,
    keypoints: I,
    radius_meters: f64,
    skip: F,
) -> Option<(&'a Keypoint, f64)>
where
    I: IntoIterator<Item = &'a Keypoint>,
    F: Fn(&Keypoint) -> bool,
{
    keypoints
        .into_iter()
        .filter(|k| !skip(k))
        .map(|k| (k, distance_between(at, keypoint_point(k))))
        .find(|(_, distance)| *distance <= radius_meters)
}

/// Closest keypoint to `at`, ignoring those rejected by `skip`.
pub fn nearest_keypoint<'a, I, F>(at: Point<f64>, keypoints: I, skip: F) -> Option<(&'a Keypoint, f64)>
where
    I: IntoIterator<Item = &'a Keypoint>,
    F: Fn(&Keypoint) -> bool,
{
    keypoints
        .into_iter()
        .filter(|k| !skip(k))
        .map(|k| (k, distance_between(at, keypoint_point(k))))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
}
