// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Position store routes.

use crate::error::{AppError, Result};
use crate::models::Position;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/positions", get(list_positions))
        .route(
            "/api/positions/{user_id}",
            get(get_position).post(set_position).delete(clear_position),
        )
}

/// Parse a user id path segment. Ids start at 1.
pub(crate) fn parse_user_id(raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::Validation(format!("Invalid user id: {}", raw)))
}

// ─── Request / Response Types ────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SetPositionRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    /// Horizontal accuracy in meters
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub accuracy: Option<f64>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PositionResponse {
    pub position: Position,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PositionsResponse {
    pub positions: Vec<Position>,
    pub count: usize,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ClearPositionResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub deleted_count: u64,
}

// ─── Handlers ────────────────────────────────────────────────

/// Latest position of every user.
async fn list_positions(State(state): State<Arc<AppState>>) -> Result<Json<PositionsResponse>> {
    let positions = state.positions.all_positions().await?;
    Ok(Json(PositionsResponse {
        count: positions.len(),
        positions,
    }))
}

async fn get_position(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<PositionResponse>> {
    let user_id = parse_user_id(&user_id)?;
    let position = state.positions.current_position(user_id).await?;
    Ok(Json(PositionResponse { position }))
}

async fn set_position(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    payload: std::result::Result<Json<SetPositionRequest>, JsonRejection>,
) -> Result<Json<PositionResponse>> {
    let user_id = parse_user_id(&user_id)?;
    let Json(req) = payload?;
    req.validate()?;

    let position = state
        .positions
        .set_position(user_id, req.latitude, req.longitude, req.accuracy)
        .await?;
    Ok(Json(PositionResponse { position }))
}

async fn clear_position(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ClearPositionResponse>> {
    let user_id = parse_user_id(&user_id)?;
    let deleted_count = state.positions.clear_position(user_id).await?;
    Ok(Json(ClearPositionResponse { deleted_count }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id("17").unwrap(), 17);
        for bad in ["0", "-1", "abc", "1.5", ""] {
            assert!(matches!(parse_user_id(bad), Err(AppError::Validation(_))), "{}", bad);
        }
    }

    #[test]
    fn test_request_validation() {
        let ok = SetPositionRequest {
            latitude: 45.0,
            longitude: 19.0,
            accuracy: Some(3.0),
        };
        assert!(ok.validate().is_ok());

        let bad = SetPositionRequest {
            latitude: 91.0,
            longitude: 19.0,
            accuracy: None,
        };
        assert!(bad.validate().is_err());

        let bad_accuracy = SetPositionRequest {
            latitude: 0.0,
            longitude: 0.0,
            accuracy: Some(-1.0),
        };
        assert!(bad_accuracy.validate().is_err());
    }
}
