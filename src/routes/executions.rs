// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tour execution routes. All act on the calling user's own executions.

use crate::error::Result;
use crate::middleware::Identity;
use crate::models::{CompletedKeypoint, TourExecution};
use crate::services::CheckKeypointsOutcome;
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
        .route("/api/executions", get(list_executions).post(start_execution))
        .route("/api/executions/active", get(get_active_execution))
        .route("/api/executions/check-keypoints", post(check_keypoints))
        .route(
            "/api/executions/{execution_id}/abandon",
            put(abandon_execution),
        )
}

// ─── Request / Response Types ────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StartExecutionRequest {
    #[validate(length(min = 1, max = 128))]
    pub tour_id: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ExecutionResponse {
    pub tour_execution: TourExecution,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActiveExecutionResponse {
    pub tour_execution: Option<TourExecution>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ExecutionsResponse {
    pub executions: Vec<TourExecution>,
    pub count: usize,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct NearestKeypointResponse {
    pub keypoint_index: u32,
    pub keypoint_name: String,
    pub distance_meters: f64,
}

/// Outcome of a keypoint check.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CheckKeypointsResponse {
    pub near_keypoint: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoint_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoint_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_to_keypoint: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_keypoint: Option<CompletedKeypoint>,
    pub remaining_keypoints: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearest_keypoint: Option<NearestKeypointResponse>,
    pub tour_execution: TourExecution,
}

impl From<CheckKeypointsOutcome> for CheckKeypointsResponse {
    fn from(outcome: CheckKeypointsOutcome) -> Self {
        Self {
            near_keypoint: outcome.near_keypoint,
            keypoint_index: outcome.keypoint_index,
            keypoint_name: outcome.keypoint_name,
            distance_to_keypoint: outcome.distance_meters,
            completed_keypoint: outcome.completed_keypoint,
            remaining_keypoints: outcome.remaining_keypoints,
            nearest_keypoint: outcome.nearest_keypoint.map(|n| NearestKeypointResponse {
                keypoint_index: n.keypoint_index,
                keypoint_name: n.keypoint_name,
                distance_meters: n.distance_meters,
            }),
            tour_execution: outcome.execution,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MessageResponse {
    pub message: String,
}

// ─── Handlers ────────────────────────────────────────────────

async fn start_execution(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    payload: std::result::Result<Json<StartExecutionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ExecutionResponse>)> {
    let Json(req) = payload?;
    req.validate()?;

    let tour_execution = state
        .executions
        .start_execution(identity.user_id, &req.tour_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ExecutionResponse { tour_execution })))
}

async fn check_keypoints(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<CheckKeypointsResponse>> {
    let outcome = state.executions.check_keypoints(identity.user_id).await?;
    Ok(Json(outcome.into()))
}

async fn abandon_execution(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(execution_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    state
        .executions
        .abandon_execution(identity.user_id, &execution_id)
        .await?;
    Ok(Json(MessageResponse {
        message: "Tour abandoned successfully".to_string(),
    }))
}

/// The caller's executions, most recently started first.
async fn list_executions(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ExecutionsResponse>> {
    let executions = state.executions.list_executions(identity.user_id).await?;
    Ok(Json(ExecutionsResponse {
        count: executions.len(),
        executions,
    }))
}

async fn get_active_execution(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ActiveExecutionResponse>> {
    let tour_execution = state.executions.active_execution(identity.user_id).await?;
    Ok(Json(ActiveExecutionResponse { tour_execution }))
}
