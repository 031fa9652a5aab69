// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Weekly reduction goal and its state machine.

use crate::models::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Goal lifecycle. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum GoalStatus {
    #[default]
    Active,
    Completed,
    Failed,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Completed => "completed",
            GoalStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, GoalStatus::Active)
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked reduction target for one category over one calendar week.
///
/// Stored in the `weekly_goals` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyGoal {
    pub id: String,
    pub user_id: String,
    /// Local midnight of the first day of the week
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub week_start: DateTime<Utc>,
    /// `week_start` + 7 days (exclusive)
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub week_end: DateTime<Utc>,
    pub category: Category,
    /// kg CO2e the user should cut from the baseline
    pub target_reduction: f64,
    /// kg CO2e the week is measured against
    pub baseline_emission: f64,
    /// Running kg CO2e for `category` within the week
    #[serde(default)]
    pub current_emission: f64,
    pub tip: String,
    pub action: String,
    #[serde(default)]
    pub status: GoalStatus,
    /// Mirror of `status == Completed`
    #[serde(default)]
    pub completed: bool,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl WeeklyGoal {
    /// Emission level at or below which the goal counts as achieved.
    pub fn target_emission(&self) -> f64 {
        self.baseline_emission - self.target_reduction
    }

    /// The completion predicate.
    pub fn is_target_met(&self) -> bool {
        self.current_emission <= self.target_emission()
    }

    /// Whether `at` falls in the goal's `[week_start, week_end)` window.
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        at >= self.week_start && at < self.week_end
    }

    /// Set the current emission and re-check completion.
    ///
    /// Terminal goals are left untouched. Returns `true` only on the
    /// `Active -> Completed` transition.
    pub fn record_emission(&mut self, current_emission: f64, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        self.current_emission = current_emission;
        self.updated_at = now;

        if self.is_target_met() {
            self.status = GoalStatus::Completed;
            self.completed = true;
            return true;
        }
        false
    }

    /// Close out a goal whose week has ended.
    ///
    /// Records the final emission; the goal ends `Completed` if the
    /// target was met, otherwise `Failed`.
    pub fn finalize(&mut self, final_emission: f64, now: DateTime<Utc>) -> GoalStatus {
        if self.status.is_terminal() {
            return self.status;
        }

        if !self.record_emission(final_emission, now) {
            self.status = GoalStatus::Failed;
            self.completed = false;
        }
        self.status
    }

    /// Percentage of the targeted reduction achieved so far, clamped to
    /// `[0, 100]`.
    pub fn progress(&self) -> f64 {
        if self.baseline_emission <= 0.0 {
            return 0.0;
        }

        if self.target_reduction <= 0.0 {
            // Any non-increase over the baseline meets a zero target.
            return if self.current_emission <= self.baseline_emission {
                100.0
            } else {
                0.0
            };
        }

        let raw =
            (self.baseline_emission - self.current_emission) / self.target_reduction * 100.0;
        raw.clamp(0.0, 100.0)
    }

    /// Whole days until the week ends, rounded up, never negative.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        let remaining = self.week_end.signed_duration_since(now);
        if remaining <= chrono::Duration::zero() {
            return 0;
        }

        let day = chrono::Duration::days(1).num_seconds();
        let secs = remaining.num_seconds();
        (secs + day - 1) / day
    }
}
