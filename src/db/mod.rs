//! Database layer.
//!
//! The engine talks to storage through the repository traits below.
//! `FirestoreDb` is the production backend, `MemoryDb` keeps everything in
//! process, and `Store` picks one at startup.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::Result;
use crate::models::{Activity, ActivityFilter, Insight, WeeklyGoal};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Collection names as constants.
pub mod collections {
    pub const ACTIVITIES: &str = "activities";
    pub const INSIGHTS: &str = "insights";
    pub const WEEKLY_GOALS: &str = "weekly_goals";
}

/// Logged activities, per user.
pub trait ActivityRepository: Send + Sync {
    /// Store a new activity.
    fn insert_activity(&self, activity: &Activity) -> impl Future<Output = Result<()>> + Send;

    /// Get one of a user's activities.
    fn get_activity(
        &self,
        user_id: &str,
        activity_id: &str,
    ) -> impl Future<Output = Result<Option<Activity>>> + Send;

    /// Find a user's activities matching `filter`, newest first.
    fn find_activities(
        &self,
        user_id: &str,
        filter: &ActivityFilter,
    ) -> impl Future<Output = Result<Vec<Activity>>> + Send;

    /// Delete one of a user's activities. Returns `false` if it did not exist.
    fn delete_activity(
        &self,
        user_id: &str,
        activity_id: &str,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// Append-only insight history.
pub trait InsightRepository: Send + Sync {
    /// Append an insight. Returns its ID.
    fn save_insight(&self, insight: &Insight) -> impl Future<Output = Result<String>> + Send;

    /// Most recently generated insight.
    fn find_latest_insight(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<Insight>>> + Send;

    /// Up to `limit` insights, newest first.
    fn find_insight_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Insight>>> + Send;
}

/// Result of an atomic goal recount.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalUpdate {
    /// The goal after the recount was applied
    pub goal: WeeklyGoal,
    /// `true` if this recount moved the goal to `Completed`
    pub newly_completed: bool,
}

/// Weekly goals, per user.
pub trait GoalRepository: Send + Sync {
    /// Active goal whose week starts at or after `week_start`.
    fn find_active_goal(
        &self,
        user_id: &str,
        week_start: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<WeeklyGoal>>> + Send;

    /// Goal of any status for the week starting exactly at `week_start`.
    fn find_goal_for_week(
        &self,
        user_id: &str,
        week_start: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<WeeklyGoal>>> + Send;

    /// Active goals whose week started before `before`.
    fn find_expired_goals(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<WeeklyGoal>>> + Send;

    /// Create or overwrite a goal. Returns its ID.
    fn save_goal(&self, goal: &WeeklyGoal) -> impl Future<Output = Result<String>> + Send;

    /// Up to `limit` goals, most recent week first.
    fn find_goal_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<WeeklyGoal>>> + Send;

    /// Atomically set an active goal's current emission to the sum of its
    /// category's activities in `[week_start, week_end)` and re-check
    /// completion.
    ///
    /// The sum is taken from stored activities in the same atomic step as
    /// the write, so an activity is counted exactly once however refreshes
    /// and new activities interleave.
    ///
    /// Returns `None` if the goal is missing or no longer active.
    fn recount_goal_emission(
        &self,
        goal_id: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<GoalUpdate>>> + Send;
}

/// Everything the engine needs from storage.
pub trait Repository: ActivityRepository + InsightRepository + GoalRepository {}

impl<T: ActivityRepository + InsightRepository + GoalRepository> Repository for T {}

/// The configured storage backend.
#[derive(Clone)]
pub enum Store {
    Firestore(FirestoreDb),
    Memory(MemoryDb),
}

impl ActivityRepository for Store {
    async fn insert_activity(&self, activity: &Activity) -> Result<()> {
        match self {
            Store::Firestore(db) => db.insert_activity(activity).await,
            Store::Memory(db) => db.insert_activity(activity).await,
        }
    }

    async fn get_activity(&self, user_id: &str, activity_id: &str) -> Result<Option<Activity>> {
        match self {
            Store::Firestore(db) => db.get_activity(user_id, activity_id).await,
            Store::Memory(db) => db.get_activity(user_id, activity_id).await,
        }
    }

    async fn find_activities(
        &self,
        user_id: &str,
        filter: &ActivityFilter,
    ) -> Result<Vec<Activity>> {
        match self {
            Store::Firestore(db) => db.find_activities(user_id, filter).await,
            Store::Memory(db) => db.find_activities(user_id, filter).await,
        }
    }

    async fn delete_activity(&self, user_id: &str, activity_id: &str) -> Result<bool> {
        match self {
            Store::Firestore(db) => db.delete_activity(user_id, activity_id).await,
            Store::Memory(db) => db.delete_activity(user_id, activity_id).await,
        }
    }
}

impl InsightRepository for Store {
    async fn save_insight(&self, insight: &Insight) -> Result<String> {
        match self {
            Store::Firestore(db) => db.save_insight(insight).await,
            Store::Memory(db) => db.save_insight(insight).await,
        }
    }

    async fn find_latest_insight(&self, user_id: &str) -> Result<Option<Insight>> {
        match self {
            Store::Firestore(db) => db.find_latest_insight(user_id).await,
            Store::Memory(db) => db.find_latest_insight(user_id).await,
        }
    }

    async fn find_insight_history(&self, user_id: &str, limit: u32) -> Result<Vec<Insight>> {
        match self {
            Store::Firestore(db) => db.find_insight_history(user_id, limit).await,
            Store::Memory(db) => db.find_insight_history(user_id, limit).await,
        }
    }
}

impl GoalRepository for Store {
    async fn find_active_goal(
        &self,
        user_id: &str,
        week_start: DateTime<Utc>,
    ) -> Result<Option<WeeklyGoal>> {
        match self {
            Store::Firestore(db) => db.find_active_goal(user_id, week_start).await,
            Store::Memory(db) => db.find_active_goal(user_id, week_start).await,
        }
    }

    async fn find_goal_for_week(
        &self,
        user_id: &str,
        week_start: DateTime<Utc>,
    ) -> Result<Option<WeeklyGoal>> {
        match self {
            Store::Firestore(db) => db.find_goal_for_week(user_id, week_start).await,
            Store::Memory(db) => db.find_goal_for_week(user_id, week_start).await,
        }
    }

    async fn find_expired_goals(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
    ) -> Result<Vec<WeeklyGoal>> {
        match self {
            Store::Firestore(db) => db.find_expired_goals(user_id, before).await,
            Store::Memory(db) => db.find_expired_goals(user_id, before).await,
        }
    }

    async fn save_goal(&self, goal: &WeeklyGoal) -> Result<String> {
        match self {
            Store::Firestore(db) => db.save_goal(goal).await,
            Store::Memory(db) => db.save_goal(goal).await,
        }
    }

    async fn find_goal_history(&self, user_id: &str, limit: u32) -> Result<Vec<WeeklyGoal>> {
        match self {
            Store::Firestore(db) => db.find_goal_history(user_id, limit).await,
            Store::Memory(db) => db.find_goal_history(user_id, limit).await,
        }
    }

    async fn recount_goal_emission(
        &self,
        goal_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<GoalUpdate>> {
        match self {
            Store::Firestore(db) => db.recount_goal_emission(goal_id, now).await,
            Store::Memory(db) => db.recount_goal_emission(goal_id, now).await,
        }
    }
}
