// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Activities (logged, priced activities)
//! - Insights (append-only tip history)
//! - Weekly goals (including the transactional progress recount)

use crate::db::{
    collections, ActivityRepository, GoalRepository, GoalUpdate, InsightRepository,
};
use crate::error::AppError;
use crate::models::{Activity, ActivityFilter, EmissionTotals, GoalStatus, Insight, WeeklyGoal};
use chrono::{DateTime, Utc};
use firestore::{FirestoreQueryDirection, FirestoreTimestamp};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Upsert a document by ID.
    async fn put<T>(&self, collection: &str, doc_id: &str, object: &T) -> Result<(), AppError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(doc_id)
            .object(object)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

// ─── Activity Operations ─────────────────────────────────────────

impl ActivityRepository for FirestoreDb {
    async fn insert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        self.put(collections::ACTIVITIES, &activity.id, activity)
            .await
    }

    async fn get_activity(
        &self,
        user_id: &str,
        activity_id: &str,
    ) -> Result<Option<Activity>, AppError> {
        let activity: Option<Activity> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .obj()
            .one(activity_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Documents are keyed by ID alone; enforce ownership here
        Ok(activity.filter(|a| a.user_id == user_id))
    }

    async fn find_activities(
        &self,
        user_id: &str,
        filter: &ActivityFilter,
    ) -> Result<Vec<Activity>, AppError> {
        let user_id = user_id.to_string();
        let from = filter.from;
        let to = filter.to;
        let category = filter.category;

        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    from.and_then(|d| {
                        q.field("date")
                            .greater_than_or_equal(FirestoreTimestamp(d))
                    }),
                    to.and_then(|d| q.field("date").less_than(FirestoreTimestamp(d))),
                    category.and_then(|c| q.field("category").eq(c.as_str())),
                ])
            })
            .order_by([
                ("date", FirestoreQueryDirection::Descending),
                ("created_at", FirestoreQueryDirection::Descending),
            ])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete_activity(&self, user_id: &str, activity_id: &str) -> Result<bool, AppError> {
        if self.get_activity(user_id, activity_id).await?.is_none() {
            return Ok(false);
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::ACTIVITIES)
            .document_id(activity_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(user_id, activity_id, "Deleted activity");
        Ok(true)
    }
}

// ─── Insight Operations ──────────────────────────────────────────

impl InsightRepository for FirestoreDb {
    async fn save_insight(&self, insight: &Insight) -> Result<String, AppError> {
        self.put(collections::INSIGHTS, &insight.id, insight).await?;
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
        let user_id = user_id.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::INSIGHTS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .order_by([("generated_at", FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

// ─── Weekly Goal Operations ──────────────────────────────────────

impl FirestoreDb {
    /// Query goals for a user, newest week first.
    async fn query_goals(
        &self,
        user_id: &str,
        status: Option<GoalStatus>,
        week_from: Option<DateTime<Utc>>,
        week_before: Option<DateTime<Utc>>,
        limit: Option<u32>,
    ) -> Result<Vec<WeeklyGoal>, AppError> {
        let user_id = user_id.to_string();

        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::WEEKLY_GOALS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    status.and_then(|s| q.field("status").eq(s.as_str())),
                    week_from.and_then(|d| {
                        q.field("week_start")
                            .greater_than_or_equal(FirestoreTimestamp(d))
                    }),
                    week_before
                        .and_then(|d| q.field("week_start").less_than(FirestoreTimestamp(d))),
                ])
            })
            .order_by([
                ("week_start", FirestoreQueryDirection::Descending),
                ("created_at", FirestoreQueryDirection::Descending),
            ]);

        let query = match limit {
            Some(limit) => query.limit(limit),
            None => query,
        };

        query
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

impl GoalRepository for FirestoreDb {
    async fn find_active_goal(
        &self,
        user_id: &str,
        week_start: DateTime<Utc>,
    ) -> Result<Option<WeeklyGoal>, AppError> {
        Ok(self
            .query_goals(
                user_id,
                Some(GoalStatus::Active),
                Some(week_start),
                None,
                Some(1),
            )
            .await?
            .into_iter()
            .next())
    }

    async fn find_goal_for_week(
        &self,
        user_id: &str,
        week_start: DateTime<Utc>,
    ) -> Result<Option<WeeklyGoal>, AppError> {
        let goals = self
            .query_goals(user_id, None, Some(week_start), None, None)
            .await?;
        Ok(goals.into_iter().find(|g| g.week_start == week_start))
    }

    async fn find_expired_goals(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
    ) -> Result<Vec<WeeklyGoal>, AppError> {
        self.query_goals(user_id, Some(GoalStatus::Active), None, Some(before), None)
            .await
    }

    async fn save_goal(&self, goal: &WeeklyGoal) -> Result<String, AppError> {
        self.put(collections::WEEKLY_GOALS, &goal.id, goal).await?;
        Ok(goal.id.clone())
    }

    async fn find_goal_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<WeeklyGoal>, AppError> {
        self.query_goals(user_id, None, None, None, Some(limit))
            .await
    }

    /// Recompute an active goal's current emission from stored activities.
    ///
    /// The goal read, the activity query and the goal write all run on the
    /// transaction-scoped client handed out by `run_transaction`, so a
    /// concurrent change to the goal aborts and retries the whole step.
    async fn recount_goal_emission(
        &self,
        goal_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<GoalUpdate>, AppError> {
        let client = self.get_client()?;
        let goal_id = goal_id.to_string();

        let update = client
            .run_transaction(|db, transaction| {
                let goal_id = goal_id.clone();
                Box::pin(async move {
                    // 1. Read the goal within the transaction
                    let current: Option<WeeklyGoal> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::WEEKLY_GOALS)
                        .obj()
                        .one(&goal_id)
                        .await?;

                    // 2. Only active goals are recounted
                    let mut goal = match current {
                        Some(goal) if !goal.status.is_terminal() => goal,
                        _ => return Ok(None),
                    };

                    // 3. Sum the goal's week for its category
                    let user_id = goal.user_id.clone();
                    let category = goal.category;
                    let week_start = goal.week_start;
                    let week_end = goal.week_end;
                    let week: Vec<Activity> = db
                        .fluent()
                        .select()
                        .from(collections::ACTIVITIES)
                        .filter(move |q| {
                            q.for_all([
                                q.field("user_id").eq(user_id.clone()),
                                q.field("category").eq(category.as_str()),
                                q.field("date")
                                    .greater_than_or_equal(FirestoreTimestamp(week_start)),
                                q.field("date").less_than(FirestoreTimestamp(week_end)),
                            ])
                        })
                        .obj()
                        .query()
                        .await?;
                    let current = EmissionTotals::from_activities(&week).emission(category);

                    // 4. Apply the completion check and stage the write
                    let newly_completed = goal.record_emission(current, now);
                    db.fluent()
                        .update()
                        .in_col(collections::WEEKLY_GOALS)
                        .document_id(&goal.id)
                        .object(&goal)
                        .add_to_transaction(transaction)?;

                    Ok(Some(GoalUpdate {
                        goal,
                        newly_completed,
                    }))
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Goal recount transaction failed: {}", e)))?;

        match &update {
            Some(update) => tracing::debug!(
                goal_id = %goal_id,
                current_emission = update.goal.current_emission,
                newly_completed = update.newly_completed,
                "Goal emission recounted"
            ),
            None => tracing::debug!(
                goal_id = %goal_id,
                "Goal missing or no longer active, skipping recount"
            ),
        }

        Ok(update)
    }
}
