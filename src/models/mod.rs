// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod category;
pub mod goal;
pub mod insight;
pub mod stats;

pub use activity::{Activity, ActivityFilter};
pub use category::Category;
pub use goal::{GoalStatus, WeeklyGoal};
pub use insight::Insight;
pub use stats::EmissionTotals;
