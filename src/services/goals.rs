// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Weekly reduction goals.
//!
//! A user has at most one goal per calendar week. The goal is seeded
//! from a fresh insight. Its progress is recounted from the week's
//! stored activities on every request and after every logged activity,
//! each time as a single atomic repository step, so an activity is
//! never counted twice no matter how requests interleave.

use crate::db::{GoalUpdate, Repository};
use crate::error::Result;
use crate::models::stats::round2;
use crate::models::{
    Activity, ActivityFilter, Category, EmissionTotals, GoalStatus, WeeklyGoal,
};
use crate::services::insight::{InsightGenerator, InsightOutcome};
use crate::services::notify::{events, NotificationSink};
use crate::time_utils::WeekCalendar;
use chrono::{DateTime, Utc};

/// Drives the weekly goal lifecycle for one repository.
pub struct GoalManager<'a, R> {
    repo: &'a R,
    calendar: WeekCalendar,
    window_days: i64,
    sink: &'a dyn NotificationSink,
}

/// Deterministic goal ID: one document per user and week.
fn goal_id(user_id: &str, week_start: DateTime<Utc>) -> String {
    format!("{}_{}", user_id, week_start.format("%Y%m%d"))
}

/// Notification payload for goal events.
pub fn goal_payload(goal: &WeeklyGoal) -> serde_json::Value {
    serde_json::json!({
        "goal_id": goal.id,
        "category": goal.category,
        "target_reduction": round2(goal.target_reduction),
        "baseline_emission": round2(goal.baseline_emission),
        "current_emission": round2(goal.current_emission),
        "status": goal.status,
        "progress": round2(goal.progress()),
    })
}

impl<'a, R: Repository> GoalManager<'a, R> {
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

    /// Sum of one category's emissions in `[from, to)`.
    async fn category_emission(
        &self,
        user_id: &str,
        category: Category,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64> {
        let filter = ActivityFilter::between(from, to).with_category(category);
        let activities = self.repo.find_activities(user_id, &filter).await?;
        Ok(EmissionTotals::from_activities(&activities).emission(category))
    }

    /// Return this week's goal, creating one if the user has none.
    ///
    /// Returns `None` when there is no recent activity to base a goal on.
    pub async fn get_or_create_weekly_goal(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<WeeklyGoal>> {
        let (week_start, week_end) = self.calendar.week_bounds(now);

        self.expire_goals(user_id, week_start, now).await?;

        if let Some(goal) = self.repo.find_active_goal(user_id, week_start).await? {
            return self.refresh(goal, now).await.map(Some);
        }

        if let Some(goal) = self.repo.find_goal_for_week(user_id, week_start).await? {
            tracing::debug!(user_id, goal_id = %goal.id, status = %goal.status, "Goal already closed for this week");
            return Ok(Some(goal));
        }

        self.create(user_id, week_start, week_end, now).await
    }

    /// Finalize active goals from earlier weeks.
    async fn expire_goals(
        &self,
        user_id: &str,
        week_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        for mut goal in self.repo.find_expired_goals(user_id, week_start).await? {
            let final_emission = self
                .category_emission(user_id, goal.category, goal.week_start, goal.week_end)
                .await?;
            let status = goal.finalize(final_emission, now);
            self.repo.save_goal(&goal).await?;

            tracing::info!(user_id, goal_id = %goal.id, status = %status, "Goal week ended");

            let event = match status {
                GoalStatus::Completed => events::GOAL_COMPLETED,
                _ => events::GOAL_FAILED,
            };
            self.sink.emit(user_id, event, goal_payload(&goal));
        }
        Ok(())
    }

    /// Recount an active goal's emission from its week's activities.
    ///
    /// If the goal was closed concurrently the stored goal is returned
    /// as is.
    async fn recount(&self, goal: WeeklyGoal, now: DateTime<Utc>) -> Result<GoalUpdate> {
        if let Some(update) = self.repo.recount_goal_emission(&goal.id, now).await? {
            return Ok(update);
        }
        let stored = self
            .repo
            .find_goal_for_week(&goal.user_id, goal.week_start)
            .await?;
        Ok(GoalUpdate {
            goal: stored.unwrap_or(goal),
            newly_completed: false,
        })
    }

    fn notify_completed(&self, goal: &WeeklyGoal) {
        tracing::info!(user_id = %goal.user_id, goal_id = %goal.id, "Goal completed");
        self.sink
            .emit(&goal.user_id, events::GOAL_COMPLETED, goal_payload(goal));
    }

    async fn refresh(&self, goal: WeeklyGoal, now: DateTime<Utc>) -> Result<WeeklyGoal> {
        let update = self.recount(goal, now).await?;
        if update.newly_completed {
            self.notify_completed(&update.goal);
        }
        Ok(update.goal)
    }

    async fn create(
        &self,
        user_id: &str,
        week_start: DateTime<Utc>,
        week_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<WeeklyGoal>> {
        let generator = InsightGenerator::new(self.repo, self.calendar, self.window_days);
        let summary = match generator.generate(user_id, now).await? {
            InsightOutcome::NoData => return Ok(None),
            InsightOutcome::Generated(summary) => summary,
        };
        self.sink
            .emit(user_id, events::NEW_INSIGHT, summary.to_payload());

        let category = summary.highest_category;
        let (prev_start, prev_end) = self.calendar.previous_week_bounds(now);
        let previous = self
            .category_emission(user_id, category, prev_start, prev_end)
            .await?;
        let baseline_emission = if previous > 0.0 {
            previous
        } else {
            summary.highest_emission
        };

        let goal = WeeklyGoal {
            id: goal_id(user_id, week_start),
            user_id: user_id.to_string(),
            week_start,
            week_end,
            category,
            target_reduction: summary.potential_reduction,
            baseline_emission,
            current_emission: 0.0,
            tip: summary.tip,
            action: summary.action,
            status: GoalStatus::Active,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        self.repo.save_goal(&goal).await?;

        // Activities logged while the goal was being built are picked up here
        let GoalUpdate {
            goal,
            newly_completed,
        } = self.recount(goal, now).await?;

        tracing::info!(
            user_id,
            goal_id = %goal.id,
            category = %category,
            baseline = baseline_emission,
            target = goal.target_reduction,
            current = goal.current_emission,
            "Created weekly goal"
        );

        self.sink.emit(user_id, events::NEW_GOAL, goal_payload(&goal));
        if newly_completed {
            self.notify_completed(&goal);
        }
        Ok(Some(goal))
    }

    /// Bring the current week's goal up to date after an activity was stored.
    ///
    /// Only activities of the goal's category dated inside the goal's
    /// week affect it. The goal is recounted from the stored activities
    /// rather than incremented, so a refresh that already saw `activity`
    /// does not lead to it being added a second time.
    pub async fn record_activity(
        &self,
        activity: &Activity,
        now: DateTime<Utc>,
    ) -> Result<Option<GoalUpdate>> {
        let week_start = self.calendar.week_start(now);
        let Some(goal) = self
            .repo
            .find_active_goal(&activity.user_id, week_start)
            .await?
        else {
            return Ok(None);
        };

        if goal.category != activity.category || !goal.covers(activity.date) {
            return Ok(None);
        }

        let update = self.repo.recount_goal_emission(&goal.id, now).await?;
        if let Some(GoalUpdate {
            goal,
            newly_completed: true,
        }) = &update
        {
            self.notify_completed(goal);
        }
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ActivityRepository, GoalRepository, InsightRepository, MemoryDb};
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// Records every emitted event.
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|(_, e)| e.clone())
                .collect()
        }
    }

    impl NotificationSink for RecordingSink {
        fn emit(&self, user_id: &str, event: &str, _payload: serde_json::Value) {
            self.events
                .lock()
                .unwrap()
                .push((user_id.to_string(), event.to_string()));
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0).unwrap()
    }

    fn make_activity(id: &str, category: Category, co2: f64, day: u32) -> Activity {
        Activity {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            category,
            activity_type: "test".to_string(),
            label: "Test".to_string(),
            amount: 1.0,
            unit: "unit".to_string(),
            date: at(day, 0),
            co2_emission: co2,
            created_at: at(day, 0),
        }
    }

    fn manager<'a>(db: &'a MemoryDb, sink: &'a RecordingSink) -> GoalManager<'a, MemoryDb> {
        GoalManager::new(db, WeekCalendar::default(), 7, sink)
    }

    #[tokio::test]
    async fn test_no_data_creates_no_goal() {
        let db = MemoryDb::new();
        let sink = RecordingSink::default();

        let goal = manager(&db, &sink)
            .get_or_create_weekly_goal("user-1", at(21, 12))
            .await
            .unwrap();

        assert!(goal.is_none());
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_create_uses_insight_when_previous_week_empty() {
        let db = MemoryDb::new();
        let sink = RecordingSink::default();
        // Car trip of 100 km: 12 kg, logged Monday of the current week
        db.insert_activity(&make_activity("a", Category::Transport, 12.0, 19))
            .await
            .unwrap();

        let goal = manager(&db, &sink)
            .get_or_create_weekly_goal("user-1", at(21, 12))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(goal.category, Category::Transport);
        assert_eq!(goal.baseline_emission, 12.0);
        assert_eq!(goal.target_reduction, 2.0);
        assert_eq!(goal.current_emission, 12.0);
        assert_eq!(goal.action, "cycle/walk");
        assert_eq!(goal.status, GoalStatus::Active);
        assert_eq!(goal.week_start, at(18, 0));
        assert_eq!(goal.week_end, at(25, 0));
        assert_eq!(goal.progress(), 0.0);
        assert_eq!(sink.events(), ["new_insight", "new_goal"]);
    }

    #[tokio::test]
    async fn test_baseline_comes_from_previous_week() {
        let db = MemoryDb::new();
        let sink = RecordingSink::default();
        db.insert_activity(&make_activity("prev", Category::Transport, 20.0, 15))
            .await
            .unwrap();
        db.insert_activity(&make_activity("now", Category::Transport, 12.0, 19))
            .await
            .unwrap();

        let goal = manager(&db, &sink)
            .get_or_create_weekly_goal("user-1", at(21, 12))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(goal.baseline_emission, 20.0);
        assert_eq!(goal.current_emission, 12.0);
        // 20 - 12 = 8 >= target of the selected tip
        assert_eq!(goal.status, GoalStatus::Completed);
        assert!(sink.events().contains(&"goal_completed".to_string()));
    }

    #[tokio::test]
    async fn test_second_request_returns_same_goal() {
        let db = MemoryDb::new();
        let sink = RecordingSink::default();
        db.insert_activity(&make_activity("a", Category::Transport, 12.0, 19))
            .await
            .unwrap();
        let manager = manager(&db, &sink);

        let first = manager
            .get_or_create_weekly_goal("user-1", at(21, 12))
            .await
            .unwrap()
            .unwrap();
        let second = manager
            .get_or_create_weekly_goal("user-1", at(22, 9))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(db.find_goal_history("user-1", 10).await.unwrap().len(), 1);
        // Refresh does not generate another insight
        assert_eq!(db.find_insight_history("user-1", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_activity_ignores_other_category_and_week() {
        let db = MemoryDb::new();
        let sink = RecordingSink::default();
        db.insert_activity(&make_activity("a", Category::Transport, 12.0, 19))
            .await
            .unwrap();
        let manager = manager(&db, &sink);
        manager
            .get_or_create_weekly_goal("user-1", at(21, 12))
            .await
            .unwrap();

        let food = make_activity("b", Category::Food, 3.0, 21);
        assert!(manager.record_activity(&food, at(21, 13)).await.unwrap().is_none());

        let last_week = make_activity("c", Category::Transport, 3.0, 14);
        assert!(manager
            .record_activity(&last_week, at(21, 13))
            .await
            .unwrap()
            .is_none());

        let bus = make_activity("d", Category::Transport, 0.6, 21);
        db.insert_activity(&bus).await.unwrap();
        let update = manager
            .record_activity(&bus, at(21, 13))
            .await
            .unwrap()
            .unwrap();
        assert!((update.goal.current_emission - 12.6).abs() < 1e-9);
        assert!(!update.newly_completed);
    }

    #[tokio::test]
    async fn test_refresh_between_insert_and_record_counts_once() {
        let db = MemoryDb::new();
        let sink = RecordingSink::default();
        db.insert_activity(&make_activity("a", Category::Transport, 12.0, 19))
            .await
            .unwrap();
        let manager = manager(&db, &sink);
        manager
            .get_or_create_weekly_goal("user-1", at(21, 12))
            .await
            .unwrap();

        // A refresh lands after the activity is stored but before the
        // logging request updates the goal
        let trip = make_activity("b", Category::Transport, 6.0, 22);
        db.insert_activity(&trip).await.unwrap();
        let refreshed = manager
            .get_or_create_weekly_goal("user-1", at(22, 9))
            .await
            .unwrap()
            .unwrap();
        assert!((refreshed.current_emission - 18.0).abs() < 1e-9);

        let update = manager
            .record_activity(&trip, at(22, 9))
            .await
            .unwrap()
            .unwrap();
        assert!((update.goal.current_emission - 18.0).abs() < 1e-9);
        let stored = db.find_active_goal("user-1", at(18, 0)).await.unwrap().unwrap();
        assert!((stored.current_emission - 18.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_create_picks_up_activity_logged_during_creation() {
        let db = MemoryDb::new();
        let sink = RecordingSink::default();
        db.insert_activity(&make_activity("a", Category::Transport, 12.0, 19))
            .await
            .unwrap();
        let manager = manager(&db, &sink);

        // The log may run before the goal exists; the stored total must
        // include it either way
        let late = make_activity("b", Category::Transport, 3.0, 21);
        let (goal, recorded) = tokio::join!(
            manager.get_or_create_weekly_goal("user-1", at(21, 12)),
            async {
                db.insert_activity(&late).await.unwrap();
                manager.record_activity(&late, at(21, 12)).await
            }
        );
        recorded.unwrap();

        let goal = goal.unwrap().unwrap();
        let stored = db.find_active_goal("user-1", at(18, 0)).await.unwrap().unwrap();
        assert!((stored.current_emission - 15.0).abs() < 1e-9);
        assert_eq!(goal.current_emission, stored.current_emission);
    }

    #[tokio::test]
    async fn test_refresh_completes_goal_after_activity_deleted() {
        let db = MemoryDb::new();
        let sink = RecordingSink::default();
        db.insert_activity(&make_activity("prev", Category::Transport, 12.0, 15))
            .await
            .unwrap();
        db.insert_activity(&make_activity("a", Category::Transport, 5.0, 19))
            .await
            .unwrap();
        db.insert_activity(&make_activity("b", Category::Transport, 7.0, 20))
            .await
            .unwrap();
        let manager = manager(&db, &sink);

        let goal = manager
            .get_or_create_weekly_goal("user-1", at(21, 12))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(goal.status, GoalStatus::Active);
        assert_eq!(goal.current_emission, 12.0);

        db.delete_activity("user-1", "b").await.unwrap();
        let goal = manager
            .get_or_create_weekly_goal("user-1", at(21, 13))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(goal.current_emission, 5.0);
        assert_eq!(goal.status, GoalStatus::Completed);
        assert!(goal.completed);
    }

    #[tokio::test]
    async fn test_expired_goal_is_finalized_next_week() {
        let db = MemoryDb::new();
        let sink = RecordingSink::default();
        db.insert_activity(&make_activity("a", Category::Transport, 12.0, 19))
            .await
            .unwrap();
        let manager = manager(&db, &sink);
        let first = manager
            .get_or_create_weekly_goal("user-1", at(21, 12))
            .await
            .unwrap()
            .unwrap();

        db.insert_activity(&make_activity("b", Category::Transport, 4.0, 26))
            .await
            .unwrap();
        let later = manager
            .get_or_create_weekly_goal("user-1", at(28, 12))
            .await
            .unwrap()
            .unwrap();

        let history = db.find_goal_history("user-1", 10).await.unwrap();
        let old = history.iter().find(|g| g.id == first.id).unwrap();
        assert_eq!(old.status, GoalStatus::Failed);
        assert!(sink.events().contains(&"goal_failed".to_string()));
        assert_ne!(later.id, first.id);
        assert_eq!(later.baseline_emission, 12.0);
    }

    #[tokio::test]
    async fn test_terminal_goal_is_returned_unchanged() {
        let db = MemoryDb::new();
        let sink = RecordingSink::default();
        db.insert_activity(&make_activity("prev", Category::Transport, 20.0, 15))
            .await
            .unwrap();
        db.insert_activity(&make_activity("a", Category::Transport, 12.0, 19))
            .await
            .unwrap();
        let manager = manager(&db, &sink);

        let goal = manager
            .get_or_create_weekly_goal("user-1", at(21, 12))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(goal.status, GoalStatus::Completed);

        db.insert_activity(&make_activity("b", Category::Transport, 50.0, 21))
            .await
            .unwrap();
        let again = manager
            .get_or_create_weekly_goal("user-1", at(21, 18))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(again, goal);
    }
}
