// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod execution;
pub mod position;
pub mod tour;

pub use execution::{CompletedKeypoint, ExecutionStatus, TourExecution};
pub use position::Position;
pub use tour::{Keypoint, Tour};
