// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tour catalog routes. Keypoint edits are restricted to the tour's author.

use crate::error::{AppError, Result};
use crate::middleware::Identity;
use crate::models::{Keypoint, Tour};
use crate::services::KeypointUpdate;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tours", get(list_tours).post(create_tour))
        .route("/api/tours/{tour_id}", get(get_tour))
        .route("/api/tours/{tour_id}/keypoints", post(add_keypoint))
        .route(
            "/api/tours/{tour_id}/keypoints/{order}",
            put(update_keypoint).delete(remove_keypoint),
        )
}

fn parse_order(raw: &str) -> Result<u32> {
    raw.parse::<u32>()
        .map_err(|_| AppError::Validation(format!("Invalid keypoint order: {}", raw)))
}

// ─── Request / Response Types ────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreateTourRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AddKeypointRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

/// Partial keypoint update. `order` cannot be changed.
#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UpdateKeypointRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TourResponse {
    pub tour: Tour,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ToursResponse {
    pub tours: Vec<Tour>,
    pub count: usize,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct KeypointResponse {
    pub keypoint: Keypoint,
}

// ─── Tours ───────────────────────────────────────────────────

async fn list_tours(State(state): State<Arc<AppState>>) -> Result<Json<ToursResponse>> {
    let tours = state.catalog.list_tours().await?;
    Ok(Json(ToursResponse {
        count: tours.len(),
        tours,
    }))
}

async fn get_tour(
    State(state): State<Arc<AppState>>,
    Path(tour_id): Path<String>,
) -> Result<Json<TourResponse>> {
    let tour = state.catalog.get_tour(&tour_id).await?;
    Ok(Json(TourResponse { tour }))
}

async fn create_tour(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    payload: std::result::Result<Json<CreateTourRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TourResponse>)> {
    let Json(req) = payload?;
    req.validate()?;
    let tour = state
        .catalog
        .create_tour(identity.user_id, &req.name, &req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(TourResponse { tour })))
}

// ─── Keypoints ───────────────────────────────────────────────

async fn add_keypoint(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(tour_id): Path<String>,
    payload: std::result::Result<Json<AddKeypointRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<KeypointResponse>)> {
    let Json(req) = payload?;
    req.validate()?;
    let keypoint = state
        .catalog
        .add_keypoint(
            identity.user_id,
            &tour_id,
            &req.name,
            &req.description,
            req.latitude,
            req.longitude,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(KeypointResponse { keypoint })))
}

async fn update_keypoint(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((tour_id, order)): Path<(String, String)>,
    payload: std::result::Result<Json<UpdateKeypointRequest>, JsonRejection>,
) -> Result<Json<KeypointResponse>> {
    let order = parse_order(&order)?;
    let Json(req) = payload?;
    req.validate()?;

    let update = KeypointUpdate {
        name: req.name,
        description: req.description,
        latitude: req.latitude,
        longitude: req.longitude,
    };
    let keypoint = state
        .catalog
        .update_keypoint(identity.user_id, &tour_id, order, update)
        .await?;
    Ok(Json(KeypointResponse { keypoint }))
}

async fn remove_keypoint(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((tour_id, order)): Path<(String, String)>,
) -> Result<Json<KeypointResponse>> {
    let order = parse_order(&order)?;
    let keypoint = state
        .catalog
        .remove_keypoint(identity.user_id, &tour_id, order)
        .await?;
    Ok(Json(KeypointResponse { keypoint }))
}
