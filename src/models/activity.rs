// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Logged activity model for storage.

use crate::models::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored activity record in Firestore.
///
/// Activities are immutable once created; they can only be deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Activity ID (also used as document ID)
    pub id: String,
    /// Owning user
    pub user_id: String,
    pub category: Category,
    /// Key into the emission factor table (e.g. "car", "beef")
    pub activity_type: String,
    /// Human-readable label from the factor table
    pub label: String,
    /// Logged quantity, always positive
    pub amount: f64,
    /// Unit of `amount` (e.g. "km", "kWh")
    pub unit: String,
    /// Calendar day of the activity, stored as local midnight
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub date: DateTime<Utc>,
    /// kg CO2e, fixed at creation time
    pub co2_emission: f64,
    /// Insertion timestamp
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Query filter for activity lookups.
///
/// `from` is inclusive and `to` is exclusive.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub category: Option<Category>,
}

impl ActivityFilter {
    /// Filter covering the half-open range `[from, to)`.
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            category: None,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Check whether an activity satisfies this filter.
    pub fn matches(&self, activity: &Activity) -> bool {
        self.from.is_none_or(|from| activity.date >= from)
            && self.to.is_none_or(|to| activity.date < to)
            && self.category.is_none_or(|c| activity.category == c)
    }
}
