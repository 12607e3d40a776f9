// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Tour Tracker: follow walkers through tours of geographic keypoints
//!
//! This crate provides the backend API that stores users' reported
//! positions, credits tour keypoints when a walker comes within range, and
//! tracks each tour execution from start to completion or abandonment.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Storage;
use services::{PositionService, TourCatalog, TourExecutionService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub positions: PositionService,
    pub catalog: TourCatalog,
    pub executions: TourExecutionService,
}

impl AppState {
    /// Wire the services onto one set of stores.
    pub fn new(config: Config, storage: Storage) -> Self {
        Self {
            config,
            positions: PositionService::new(storage.positions.clone()),
            catalog: TourCatalog::new(storage.tours.clone()),
            executions: TourExecutionService::new(
                storage.positions,
                storage.tours,
                storage.executions,
            ),
        }
    }
}
