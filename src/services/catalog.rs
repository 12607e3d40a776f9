// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tour catalog: seed loading and keypoint management.

use crate::db::TourStore;
use crate::error::{AppError, Result};
use crate::models::position::valid_coordinates;
use crate::models::{Keypoint, Tour};
use crate::services::locks::KeyedLocks;
use geojson::GeoJson;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Changes to an existing keypoint. `order` is not editable.
#[derive(Debug, Default, Clone)]
pub struct KeypointUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Clone)]
pub struct TourCatalog {
    store: Arc<dyn TourStore>,
    /// Serializes read-modify-write edits per tour id
    locks: KeyedLocks<String>,
}

impl TourCatalog {
    pub fn new(store: Arc<dyn TourStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Parse tours from a GeoJSON file. See `parse_tours_geojson`.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Vec<Tour>, CatalogError> {
        let json_data =
            fs::read_to_string(path.as_ref()).map_err(|e| CatalogError::IoError(e.to_string()))?;
        parse_tours_geojson(&json_data)
    }

    /// Store seed tours that are not in the catalog yet.
    ///
    /// A stored tour wins over its seed: keypoints edited at runtime are
    /// kept, and `next_order` only moves forward so orders already handed
    /// out are never reissued.
    pub async fn seed(&self, tours: &[Tour]) -> Result<()> {
        let mut created = 0;
        for seed in tours {
            let inserted = self
                .locks
                .run(seed.id.clone(), self.seed_one(seed))
                .await?;
            if inserted {
                created += 1;
            }
        }
        tracing::info!(count = tours.len(), created, "Tour catalog seeded");
        Ok(())
    }

    async fn seed_one(&self, seed: &Tour) -> Result<bool> {
        match self.store.get_tour(&seed.id).await? {
            None => {
                self.store.save_tour(seed).await?;
                Ok(true)
            }
            Some(mut stored) => {
                if seed.next_order > stored.next_order {
                    stored.next_order = seed.next_order;
                    self.store.save_tour(&stored).await?;
                }
                tracing::debug!(tour_id = %seed.id, "Seed tour already stored");
                Ok(false)
            }
        }
    }

    pub async fn get_tour(&self, tour_id: &str) -> Result<Tour> {
        self.store
            .get_tour(tour_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tour {} not found", tour_id)))
    }

    pub async fn list_tours(&self) -> Result<Vec<Tour>> {
        self.store.list_tours().await
    }

    pub async fn create_tour(&self, author_id: u64, name: &str, description: &str) -> Result<Tour> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Tour name must not be empty".to_string()));
        }

        let tour = Tour::new(
            uuid::Uuid::new_v4().to_string(),
            name.to_string(),
            description.to_string(),
            author_id,
        );
        self.store.save_tour(&tour).await?;
        tracing::info!(tour_id = %tour.id, author_id, "Tour created");
        Ok(tour)
    }

    pub async fn add_keypoint(
        &self,
        user_id: u64,
        tour_id: &str,
        name: &str,
        description: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Keypoint> {
        check_coordinates(latitude, longitude)?;
        if name.trim().is_empty() {
            return Err(AppError::Validation("Keypoint name must not be empty".to_string()));
        }

        self.edit_tour(user_id, tour_id, |tour| {
            Ok(tour.add_keypoint(
                name.trim().to_string(),
                description.to_string(),
                latitude,
                longitude,
            ))
        })
        .await
    }

    pub async fn update_keypoint(
        &self,
        user_id: u64,
        tour_id: &str,
        order: u32,
        update: KeypointUpdate,
    ) -> Result<Keypoint> {
        let KeypointUpdate {
            name,
            description,
            latitude,
            longitude,
        } = update;

        self.edit_tour(user_id, tour_id, |tour| {
            let keypoint = tour
                .keypoints
                .iter_mut()
                .find(|k| k.order == order)
                .ok_or_else(|| AppError::NotFound(format!("Keypoint {} not found", order)))?;

            let latitude = latitude.unwrap_or(keypoint.latitude);
            let longitude = longitude.unwrap_or(keypoint.longitude);
            check_coordinates(latitude, longitude)?;

            if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
                keypoint.name = name.trim().to_string();
            }
            if let Some(description) = description {
                keypoint.description = description;
            }
            keypoint.latitude = latitude;
            keypoint.longitude = longitude;

            let updated = keypoint.clone();
            tour.updated_at = chrono::Utc::now();
            Ok(updated)
        })
        .await
    }

    pub async fn remove_keypoint(&self, user_id: u64, tour_id: &str, order: u32) -> Result<Keypoint> {
        self.edit_tour(user_id, tour_id, |tour| {
            tour.remove_keypoint(order)
                .ok_or_else(|| AppError::NotFound(format!("Keypoint {} not found", order)))
        })
        .await
    }

    /// Load, check authorship, mutate, save. Serialized per tour.
    async fn edit_tour<T, F>(&self, user_id: u64, tour_id: &str, edit: F) -> Result<T>
    where
        F: FnOnce(&mut Tour) -> Result<T>,
    {
        self.locks
            .run(tour_id.to_string(), self.edit_locked(user_id, tour_id, edit))
            .await
    }

    async fn edit_locked<T, F>(&self, user_id: u64, tour_id: &str, edit: F) -> Result<T>
    where
        F: FnOnce(&mut Tour) -> Result<T>,
    {
        let mut tour = self.get_tour(tour_id).await?;
        if tour.author_id != user_id {
            return Err(AppError::Forbidden(
                "Only the tour author can change its keypoints".to_string(),
            ));
        }

        let result = edit(&mut tour)?;
        self.store.save_tour(&tour).await?;
        tracing::info!(tour_id, keypoints = tour.total_keypoints(), "Tour keypoints changed");
        Ok(result)
    }
}

fn check_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if valid_coordinates(latitude, longitude) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Coordinates out of range: ({}, {})",
            latitude, longitude
        )))
    }
}

/// Parse a FeatureCollection of keypoint `Point`s into tours.
///
/// Feature properties: `tour_id` (required), `name` (required),
/// `tour_name`, `tour_description`, `description`, `author_id`, `order`.
/// Keypoints without `order` are numbered after the explicit ones, in file
/// order.
pub fn parse_tours_geojson(json_data: &str) -> std::result::Result<Vec<Tour>, CatalogError> {
    let geojson: GeoJson = json_data
        .parse()
        .map_err(|e: geojson::Error| CatalogError::ParseError(e.to_string()))?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(CatalogError::ParseError(
            "Expected a FeatureCollection".to_string(),
        ));
    };

    let mut tours: BTreeMap<String, Tour> = BTreeMap::new();
    let mut unordered: BTreeMap<String, Vec<Keypoint>> = BTreeMap::new();

    for feature in collection.features {
        let str_prop = |key: &str| {
            feature
                .property(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        let tour_id = str_prop("tour_id").ok_or(CatalogError::MissingProperty("tour_id"))?;
        let name = str_prop("name").ok_or(CatalogError::MissingProperty("name"))?;
        let description = str_prop("description").unwrap_or_default();
        let order = feature
            .property("order")
            .and_then(|v| v.as_u64())
            .and_then(|o| u32::try_from(o).ok());

        let tour = tours.entry(tour_id.clone()).or_insert_with(|| {
            Tour::new(
                tour_id.clone(),
                str_prop("tour_name").unwrap_or_else(|| tour_id.clone()),
                str_prop("tour_description").unwrap_or_default(),
                feature
                    .property("author_id")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0),
            )
        });

        let Some(geometry) = feature.geometry.as_ref() else {
            return Err(CatalogError::UnsupportedGeometry);
        };
        let point: geo::Point<f64> = geometry
            .value
            .clone()
            .try_into()
            .map_err(|_| CatalogError::UnsupportedGeometry)?;

        let keypoint = Keypoint {
            name,
            description,
            latitude: point.y(),
            longitude: point.x(),
            order: order.unwrap_or(0),
        };

        if !valid_coordinates(keypoint.latitude, keypoint.longitude) {
            return Err(CatalogError::ParseError(format!(
                "Keypoint '{}' has out-of-range coordinates",
                keypoint.name
            )));
        }

        match order {
            Some(_) => tour.keypoints.push(keypoint),
            None => unordered.entry(tour_id).or_default().push(keypoint),
        }
    }

    let mut tours: Vec<Tour> = tours.into_values().collect();
    for tour in &mut tours {
        tour.normalize();
        for keypoint in unordered.remove(&tour.id).unwrap_or_default() {
            tour.add_keypoint(
                keypoint.name,
                keypoint.description,
                keypoint.latitude,
                keypoint.longitude,
            );
        }
    }

    tracing::info!(count = tours.len(), "Loaded tours");
    Ok(tours)
}

/// Errors from catalog seed loading.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read file: {0}")]
    IoError(String),

    #[error("Failed to parse GeoJSON: {0}")]
    ParseError(String),

    #[error("Unsupported geometry type (expected Point)")]
    UnsupportedGeometry,

    #[error("Feature is missing required property '{0}'")]
    MissingProperty(&'static str),
}
