// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persisted insight snapshots.

use crate::models::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A dated snapshot of a user's dominant emission category plus the tip
/// selected for it.
///
/// Stored in the `insights` collection. Records are append-only: every
/// successful generation writes a new document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub user_id: String,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub generated_at: DateTime<Utc>,
    pub highest_category: Category,
    /// Summed kg CO2e per category over the trailing window (keyed by
    /// category name)
    #[serde(default)]
    pub category_emissions: BTreeMap<String, f64>,
    pub total_emissions: f64,
    pub tip: String,
    pub action: String,
    /// kg CO2e per week the tip could save
    pub potential_reduction: f64,
    #[serde(default)]
    pub viewed: bool,
}

impl Insight {
    /// Emission of the highest category at generation time.
    pub fn highest_emission(&self) -> f64 {
        self.category_emissions
            .get(self.highest_category.as_str())
            .copied()
            .unwrap_or(0.0)
    }
}
