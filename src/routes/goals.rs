// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Weekly goal routes.

use crate::db::GoalRepository;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::stats::round2;
use crate::models::{Category, GoalStatus, WeeklyGoal};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const NO_GOAL_MESSAGE: &str = "Log some activities first to get a personalized goal!";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/goals/current", get(get_current_goal))
        .route("/api/goals", axum::routing::post(create_goal))
        .route("/api/goals/history", get(get_goal_history))
}

/// A weekly goal as returned to clients.
#[derive(Serialize, Debug, Clone)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GoalView {
    pub id: String,
    pub category: Category,
    pub week_start: String,
    pub week_end: String,
    pub target_reduction: f64,
    pub baseline_emission: f64,
    pub current_emission: f64,
    /// Emission level that completes the goal
    pub target_emission: f64,
    pub tip: String,
    pub action: String,
    pub status: GoalStatus,
    pub completed: bool,
    pub progress: f64,
}

impl From<&WeeklyGoal> for GoalView {
    fn from(goal: &WeeklyGoal) -> Self {
        Self {
            id: goal.id.clone(),
            category: goal.category,
            week_start: format_utc_rfc3339(goal.week_start),
            week_end: format_utc_rfc3339(goal.week_end),
            target_reduction: round2(goal.target_reduction),
            baseline_emission: round2(goal.baseline_emission),
            current_emission: round2(goal.current_emission),
            target_emission: round2(goal.target_emission()),
            tip: goal.tip.clone(),
            action: goal.action.clone(),
            status: goal.status,
            completed: goal.completed,
            progress: round2(goal.progress()),
        }
    }
}

/// Goal response; `has_goal` is false when no goal could be derived.
#[derive(Serialize, Debug)]
pub struct GoalResponse {
    pub has_goal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<GoalView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
}

impl GoalResponse {
    pub fn new(goal: Option<&WeeklyGoal>, now: DateTime<Utc>) -> Self {
        match goal {
            Some(goal) => Self {
                has_goal: true,
                message: None,
                goal: Some(goal.into()),
                progress: Some(round2(goal.progress())),
                days_remaining: Some(goal.days_remaining(now)),
            },
            None => Self {
                has_goal: false,
                message: Some(NO_GOAL_MESSAGE.to_string()),
                goal: None,
                progress: None,
                days_remaining: None,
            },
        }
    }
}

/// Get this week's goal, creating one from recent activity if needed.
async fn get_current_goal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<GoalResponse>> {
    let now = Utc::now();
    let goal = state
        .goal_manager()
        .get_or_create_weekly_goal(&user.user_id, now)
        .await?;

    Ok(Json(GoalResponse::new(goal.as_ref(), now)))
}

/// Explicitly request a goal for this week.
///
/// Unlike `GET /api/goals/current`, a user with no recent activity gets
/// a 400.
async fn create_goal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<(StatusCode, Json<GoalResponse>)> {
    let now = Utc::now();
    let goal = state
        .goal_manager()
        .get_or_create_weekly_goal(&user.user_id, now)
        .await?
        .ok_or_else(|| AppError::BadRequest(NO_GOAL_MESSAGE.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(GoalResponse::new(Some(&goal), now)),
    ))
}

/// Goals per status in a history listing.
#[derive(Serialize, Debug, Default, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GoalStatusCounts {
    pub active: u32,
    pub completed: u32,
    pub failed: u32,
}

impl GoalStatusCounts {
    fn tally<'a>(goals: impl IntoIterator<Item = &'a WeeklyGoal>) -> Self {
        goals.into_iter().fold(Self::default(), |mut counts, goal| {
            match goal.status {
                GoalStatus::Active => counts.active += 1,
                GoalStatus::Completed => counts.completed += 1,
                GoalStatus::Failed => counts.failed += 1,
            }
            counts
        })
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GoalHistoryResponse {
    pub goals: Vec<GoalView>,
    pub counts: GoalStatusCounts,
}

/// Most recent goals, latest week first.
async fn get_goal_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<GoalHistoryResponse>> {
    let goals = state
        .db
        .find_goal_history(&user.user_id, state.config.history_limit)
        .await?;

    Ok(Json(GoalHistoryResponse {
        counts: GoalStatusCounts::tally(&goals),
        goals: goals.iter().map(GoalView::from).collect(),
    }))
}
