// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process storage backend.
//!
//! Used for local runs without Firestore and by the test suite. Every
//! operation yields to the scheduler before touching the tables so
//! concurrent requests interleave the way they would against a remote
//! store.

use crate::db::{
    collections, ActivityRepository, GoalRepository, GoalUpdate, InsightRepository,
};
use crate::error::AppError;
use crate::models::{Activity, ActivityFilter, EmissionTotals, GoalStatus, Insight, WeeklyGoal};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    activities: HashMap<String, Activity>,
    insights: Vec<Insight>,
    goals: HashMap<String, WeeklyGoal>,
}

/// Thread-safe in-memory store.
#[derive(Clone, Default)]
pub struct MemoryDb {
    tables: Arc<Mutex<Tables>>,
    fail_writes: Arc<AtomicBool>,
    /// Collections whose writes fail regardless of `fail_writes`
    failing_collections: Arc<Mutex<HashSet<&'static str>>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a database error.
    ///
    /// Reads keep working. Intended for exercising error paths in tests.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make writes to one collection fail with a database error.
    pub fn set_fail_writes_to(&self, collection: &'static str, fail: bool) {
        let mut failing = self
            .failing_collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if fail {
            failing.insert(collection);
        } else {
            failing.remove(collection);
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::Database("memory store lock poisoned".to_string()))
    }

    fn check_writable(&self, collection: &str) -> Result<(), AppError> {
        let collection_failing = self
            .failing_collections
            .lock()
            .map_err(|_| AppError::Database("memory store lock poisoned".to_string()))?
            .contains(collection);

        if collection_failing || self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database(format!("write to {} rejected", collection)));
        }
        Ok(())
    }
}

fn newest_goals_first(goals: &mut [WeeklyGoal]) {
    goals.sort_by(|a, b| {
        b.week_start
            .cmp(&a.week_start)
            .then(b.created_at.cmp(&a.created_at))
    });
}

impl ActivityRepository for MemoryDb {
    async fn insert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        tokio::task::yield_now().await;
        self.check_writable(collections::ACTIVITIES)?;

        self.lock()?
            .activities
            .insert(activity.id.clone(), activity.clone());
        Ok(())
    }

    async fn get_activity(
        &self,
        user_id: &str,
        activity_id: &str,
    ) -> Result<Option<Activity>, AppError> {
        tokio::task::yield_now().await;

        Ok(self
            .lock()?
            .activities
            .get(activity_id)
            .filter(|a| a.user_id == user_id)
            .cloned())
    }

    async fn find_activities(
        &self,
        user_id: &str,
        filter: &ActivityFilter,
    ) -> Result<Vec<Activity>, AppError> {
        tokio::task::yield_now().await;

        let mut activities: Vec<Activity> = self
            .lock()?
            .activities
            .values()
            .filter(|a| a.user_id == user_id && filter.matches(a))
            .cloned()
            .collect();

        activities.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(activities)
    }

    async fn delete_activity(&self, user_id: &str, activity_id: &str) -> Result<bool, AppError> {
        tokio::task::yield_now().await;
        self.check_writable(collections::ACTIVITIES)?;

        let mut tables = self.lock()?;
        let owned = tables
            .activities
            .get(activity_id)
            .is_some_and(|a| a.user_id == user_id);
        if owned {
            tables.activities.remove(activity_id);
        }
        Ok(owned)
    }
}

impl InsightRepository for MemoryDb {
    async fn save_insight(&self, insight: &Insight) -> Result<String, AppError> {
        tokio::task::yield_now().await;
        self.check_writable(collections::INSIGHTS)?;

        self.lock()?.insights.push(insight.clone());
        Ok(insight.id.clone())
    }

    async fn find_latest_insight(&self, user_id: &str) -> Result<Option<Insight>, AppError> {
        Ok(self
            .find_insight_history(user_id, 1)
            .await?
            .into_iter()
            .next())
    }

    async fn find_insight_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Insight>, AppError> {
        tokio::task::yield_now().await;

        let tables = self.lock()?;
        // Insertion order breaks ties between equal timestamps
        let mut insights: Vec<(usize, &Insight)> = tables
            .insights
            .iter()
            .enumerate()
            .filter(|(_, i)| i.user_id == user_id)
            .collect();
        insights.sort_by(|(ia, a), (ib, b)| b.generated_at.cmp(&a.generated_at).then(ib.cmp(ia)));

        Ok(insights
            .into_iter()
            .take(limit as usize)
            .map(|(_, i)| i.clone())
            .collect())
    }
}

impl GoalRepository for MemoryDb {
    async fn find_active_goal(
        &self,
        user_id: &str,
        week_start: DateTime<Utc>,
    ) -> Result<Option<WeeklyGoal>, AppError> {
        tokio::task::yield_now().await;

        let mut goals: Vec<WeeklyGoal> = self
            .lock()?
            .goals
            .values()
            .filter(|g| {
                g.user_id == user_id
                    && g.status == GoalStatus::Active
                    && g.week_start >= week_start
            })
            .cloned()
            .collect();

        newest_goals_first(&mut goals);
        Ok(goals.into_iter().next())
    }

    async fn find_goal_for_week(
        &self,
        user_id: &str,
        week_start: DateTime<Utc>,
    ) -> Result<Option<WeeklyGoal>, AppError> {
        tokio::task::yield_now().await;

        let mut goals: Vec<WeeklyGoal> = self
            .lock()?
            .goals
            .values()
            .filter(|g| g.user_id == user_id && g.week_start == week_start)
            .cloned()
            .collect();

        newest_goals_first(&mut goals);
        Ok(goals.into_iter().next())
    }

    async fn find_expired_goals(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
    ) -> Result<Vec<WeeklyGoal>, AppError> {
        tokio::task::yield_now().await;

        let mut goals: Vec<WeeklyGoal> = self
            .lock()?
            .goals
            .values()
            .filter(|g| {
                g.user_id == user_id && g.status == GoalStatus::Active && g.week_start < before
            })
            .cloned()
            .collect();

        newest_goals_first(&mut goals);
        Ok(goals)
    }

    async fn save_goal(&self, goal: &WeeklyGoal) -> Result<String, AppError> {
        tokio::task::yield_now().await;
        self.check_writable(collections::WEEKLY_GOALS)?;

        self.lock()?.goals.insert(goal.id.clone(), goal.clone());
        Ok(goal.id.clone())
    }

    async fn find_goal_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<WeeklyGoal>, AppError> {
        tokio::task::yield_now().await;

        let mut goals: Vec<WeeklyGoal> = self
            .lock()?
            .goals
            .values()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect();

        newest_goals_first(&mut goals);
        goals.truncate(limit as usize);
        Ok(goals)
    }

    async fn recount_goal_emission(
        &self,
        goal_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<GoalUpdate>, AppError> {
        tokio::task::yield_now().await;
        self.check_writable(collections::WEEKLY_GOALS)?;

        // Sum, update and write under a single lock acquisition
        let mut guard = self.lock()?;
        let tables = &mut *guard;
        let Some(goal) = tables.goals.get_mut(goal_id) else {
            return Ok(None);
        };
        if goal.status.is_terminal() {
            return Ok(None);
        }

        let week = tables
            .activities
            .values()
            .filter(|a| a.user_id == goal.user_id && goal.covers(a.date));
        let current = EmissionTotals::from_activities(week).emission(goal.category);

        let newly_completed = goal.record_emission(current, now);
        Ok(Some(GoalUpdate {
            goal: goal.clone(),
            newly_completed,
        }))
    }
}
