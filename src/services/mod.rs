// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod catalog;
pub mod execution;
mod locks;
pub mod position;
pub mod proximity;

pub use catalog::{CatalogError, KeypointUpdate, TourCatalog};
pub use execution::{CheckKeypointsOutcome, NearestKeypoint, TourExecutionService};
pub use position::PositionService;
