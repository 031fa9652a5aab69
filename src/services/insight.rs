// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Insight generation.
//!
//! Aggregates a user's trailing window of activities, picks the
//! highest-emitting category and stores a tip for it. Every call that
//! finds data appends a new insight record.

use crate::db::{ActivityRepository, InsightRepository};
use crate::error::Result;
use crate::models::stats::{round2, CategoryBreakdown};
use crate::models::{ActivityFilter, Category, EmissionTotals, Insight};
use crate::services::tips::select_tip;
use crate::time_utils::WeekCalendar;
use chrono::{DateTime, Duration, Utc};

/// Result of an insight generation run.
#[derive(Debug, Clone, PartialEq)]
pub enum InsightOutcome {
    /// No positive emissions in the window; nothing was stored.
    NoData,
    Generated(InsightSummary),
}

/// What a freshly stored insight says.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightSummary {
    pub insight_id: String,
    pub generated_at: DateTime<Utc>,
    pub highest_category: Category,
    pub highest_emission: f64,
    pub total_emissions: f64,
    pub category_breakdown: Vec<CategoryBreakdown>,
    pub tip: String,
    pub action: String,
    pub potential_reduction: f64,
}

impl InsightSummary {
    /// Notification payload with display-rounded figures.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "insight_id": self.insight_id,
            "highest_category": self.highest_category,
            "highest_emission": round2(self.highest_emission),
            "total_emissions": round2(self.total_emissions),
            "tip": self.tip,
            "action": self.action,
            "potential_reduction": self.potential_reduction,
        })
    }
}

/// Generates insights over a trailing window.
pub struct InsightGenerator<'a, R> {
    repo: &'a R,
    calendar: WeekCalendar,
    window_days: i64,
}

impl<'a, R> InsightGenerator<'a, R>
where
    R: ActivityRepository + InsightRepository,
{
    pub fn new(repo: &'a R, calendar: WeekCalendar, window_days: i64) -> Self {
        Self {
            repo,
            calendar,
            window_days,
        }
    }

    /// `[now - window, start of tomorrow)`.
    ///
    /// Activities carry only a calendar day, so the end is pushed to the
    /// next local midnight to include everything dated today.
    pub fn window(&self, now: DateTime<Utc>) -> ActivityFilter {
        ActivityFilter::between(
            now - Duration::days(self.window_days),
            self.calendar.next_day_start(now),
        )
    }

    /// Generate and store an insight for `user_id`.
    pub async fn generate(&self, user_id: &str, now: DateTime<Utc>) -> Result<InsightOutcome> {
        let activities = self
            .repo
            .find_activities(user_id, &self.window(now))
            .await?;
        let totals = EmissionTotals::from_activities(&activities);

        let Some((highest_category, highest_emission)) = totals.highest() else {
            tracing::debug!(user_id, count = totals.count(), "No emissions in window");
            return Ok(InsightOutcome::NoData);
        };
        let total_emissions = totals.total();
        if total_emissions <= 0.0 {
            return Ok(InsightOutcome::NoData);
        }

        let selected = select_tip(highest_category, highest_emission);

        let insight = Insight {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            generated_at: now,
            highest_category,
            category_emissions: totals.to_map(),
            total_emissions,
            tip: selected.tip.to_string(),
            action: selected.action.to_string(),
            potential_reduction: selected.reduction,
            viewed: false,
        };
        let insight_id = self.repo.save_insight(&insight).await?;

        tracing::info!(
            user_id,
            insight_id = %insight_id,
            category = %highest_category,
            emission = highest_emission,
            "Generated insight"
        );

        Ok(InsightOutcome::Generated(InsightSummary {
            insight_id,
            generated_at: now,
            highest_category,
            highest_emission,
            total_emissions,
            category_breakdown: totals.breakdown(),
            tip: insight.tip,
            action: insight.action,
            potential_reduction: insight.potential_reduction,
        }))
    }
}
