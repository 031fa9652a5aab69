// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity logging service.
//!
//! Handles the core workflow:
//! 1. Price the activity from the emission factor table
//! 2. Store the activity
//! 3. Generate a fresh insight over the trailing window
//! 4. Recount this week's goal
//!
//! Once the activity is stored the request succeeds. Failures in steps 3
//! and 4 are logged and leave the corresponding result field empty, so a
//! client never retries (and double-logs) an activity that was saved.

use crate::db::{GoalUpdate, Repository};
use crate::error::{AppError, Result};
use crate::models::{Activity, Category};
use crate::services::emission;
use crate::services::goals::GoalManager;
use crate::services::insight::{InsightGenerator, InsightOutcome};
use crate::services::notify::{events, NotificationSink};
use crate::time_utils::WeekCalendar;
use chrono::{DateTime, NaiveDate, Utc};

/// A user's request to log an activity.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub category: Category,
    pub activity_type: String,
    pub amount: f64,
    /// Calendar day of the activity; defaults to today
    pub date: Option<NaiveDate>,
}

/// Logs activities and keeps insights and goals in step.
pub struct ActivityProcessor<'a, R> {
    repo: &'a R,
    calendar: WeekCalendar,
    window_days: i64,
    sink: &'a dyn NotificationSink,
}

impl<'a, R: Repository> ActivityProcessor<'a, R> {
    pub fn new(
        repo: &'a R,
        calendar: WeekCalendar,
        window_days: i64,
        sink: &'a dyn NotificationSink,
    ) -> Self {
        Self {
            repo,
            calendar,
            window_days,
            sink,
        }
    }

    /// Log an activity for `user_id`.
    ///
    /// Unknown activity types are rejected before anything is written.
    pub async fn log_activity(
        &self,
        user_id: &str,
        request: NewActivity,
        now: DateTime<Utc>,
    ) -> Result<LogResult> {
        if !request.amount.is_finite() || request.amount <= 0.0 {
            return Err(AppError::BadRequest(
                "amount must be a positive number".to_string(),
            ));
        }

        // 1. Price the activity
        let factor = emission::lookup(request.category, &request.activity_type)?;
        let day = request
            .date
            .unwrap_or_else(|| self.calendar.local_date(now));

        let activity = Activity {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            category: request.category,
            activity_type: request.activity_type,
            label: factor.label.to_string(),
            amount: request.amount,
            unit: factor.amount_unit().to_string(),
            date: self.calendar.day_start(day),
            co2_emission: factor.emission_for(request.amount),
            created_at: now,
        };

        // 2. Store it
        self.repo.insert_activity(&activity).await?;
        tracing::info!(
            user_id,
            activity_id = %activity.id,
            category = %activity.category,
            activity_type = %activity.activity_type,
            co2 = activity.co2_emission,
            "Logged activity"
        );

        // 3. Refresh the insight
        let insight = match InsightGenerator::new(self.repo, self.calendar, self.window_days)
            .generate(user_id, now)
            .await
        {
            Ok(insight) => Some(insight),
            Err(e) => {
                tracing::warn!(
                    user_id,
                    activity_id = %activity.id,
                    error = %e,
                    "Insight refresh failed after logging activity"
                );
                None
            }
        };
        if let Some(InsightOutcome::Generated(summary)) = &insight {
            self.sink
                .emit(user_id, events::NEW_INSIGHT, summary.to_payload());
        }

        // 4. Update this week's goal
        let goal = match GoalManager::new(self.repo, self.calendar, self.window_days, self.sink)
            .record_activity(&activity, now)
            .await
        {
            Ok(goal) => goal,
            Err(e) => {
                tracing::warn!(
                    user_id,
                    activity_id = %activity.id,
                    error = %e,
                    "Goal update failed after logging activity"
                );
                None
            }
        };

        Ok(LogResult {
            activity,
            insight,
            goal,
        })
    }
}

/// Result of logging an activity.
#[derive(Debug)]
pub struct LogResult {
    pub activity: Activity,
    /// `None` when the insight could not be refreshed
    pub insight: Option<InsightOutcome>,
    /// Set when the activity counted toward an active goal
    pub goal: Option<GoalUpdate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{collections, ActivityRepository, InsightRepository, MemoryDb};
    use crate::models::ActivityFilter;
    use crate::services::notify::NullSink;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 21, 12, 0, 0).unwrap()
    }

    fn car(amount: f64) -> NewActivity {
        NewActivity {
            category: Category::Transport,
            activity_type: "car".to_string(),
            amount,
            date: None,
        }
    }

    #[tokio::test]
    async fn test_log_prices_and_stores_activity() {
        let db = MemoryDb::new();
        let processor = ActivityProcessor::new(&db, WeekCalendar::default(), 7, &NullSink);

        let result = processor.log_activity("user-1", car(100.0), now()).await.unwrap();

        assert!((result.activity.co2_emission - 12.0).abs() < 1e-9);
        assert_eq!(result.activity.unit, "km");
        assert_eq!(result.activity.label, "Car Travel");
        assert_eq!(
            result.activity.date,
            Utc.with_ymd_and_hms(2026, 10, 21, 0, 0, 0).unwrap()
        );
        assert!(matches!(result.insight, Some(InsightOutcome::Generated(_))));
        assert!(result.goal.is_none());
    }

    #[tokio::test]
    async fn test_unknown_activity_type_writes_nothing() {
        let db = MemoryDb::new();
        let processor = ActivityProcessor::new(&db, WeekCalendar::default(), 7, &NullSink);
        let request = NewActivity {
            category: Category::Food,
            activity_type: "car".to_string(),
            amount: 1.0,
            date: None,
        };

        let result = processor.log_activity("user-1", request, now()).await;

        assert!(matches!(result, Err(AppError::UnknownActivity(_))));
        let stored = db
            .find_activities("user-1", &ActivityFilter::default())
            .await
            .unwrap();
        assert!(stored.is_empty());
        assert!(db.find_latest_insight("user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_positive_amount_is_rejected() {
        let db = MemoryDb::new();
        let processor = ActivityProcessor::new(&db, WeekCalendar::default(), 7, &NullSink);

        for amount in [0.0, -3.0, f64::NAN] {
            let result = processor.log_activity("user-1", car(amount), now()).await;
            assert!(matches!(result, Err(AppError::BadRequest(_))));
        }
    }

    #[tokio::test]
    async fn test_zero_factor_activity_stores_but_yields_no_insight() {
        let db = MemoryDb::new();
        let processor = ActivityProcessor::new(&db, WeekCalendar::default(), 7, &NullSink);
        let request = NewActivity {
            category: Category::Transport,
            activity_type: "bicycle".to_string(),
            amount: 15.0,
            date: None,
        };

        let result = processor.log_activity("user-1", request, now()).await.unwrap();

        assert_eq!(result.activity.co2_emission, 0.0);
        assert_eq!(result.insight, Some(InsightOutcome::NoData));
    }

    #[tokio::test]
    async fn test_insight_failure_after_store_still_returns_activity() {
        let db = MemoryDb::new();
        db.set_fail_writes_to(collections::INSIGHTS, true);
        let processor = ActivityProcessor::new(&db, WeekCalendar::default(), 7, &NullSink);

        let result = processor.log_activity("user-1", car(100.0), now()).await.unwrap();

        assert!(result.insight.is_none());
        let stored = db
            .find_activities("user-1", &ActivityFilter::default())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, result.activity.id);
        assert!(db.find_latest_insight("user-1").await.unwrap().is_none());
    }
}
