// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users: activities and the dashboard.

use crate::db::{ActivityRepository, GoalRepository, InsightRepository};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::stats::{daily_totals, round2, CategoryBreakdown};
use crate::models::{Activity, ActivityFilter, Category, EmissionTotals};
use crate::routes::goals::GoalView;
use crate::routes::insights::{InsightResponse, InsightView};
use crate::services::emission::{self, EmissionFactor};
use crate::services::NewActivity;
use crate::time_utils::{format_utc_rfc3339, WeekCalendar};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    routing::{delete, get},
    Extension, Json, Router,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Days shown in the dashboard's daily chart, today included.
const DASHBOARD_DAYS: i64 = 7;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/activities", get(get_activities).post(create_activity))
        .route("/api/activities/{id}", delete(delete_activity))
        .route("/api/dashboard/stats", get(get_dashboard_stats))
}

/// Routes that need no authentication.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/carbon-data", get(get_carbon_data))
}

// ─── Emission Factors ────────────────────────────────────────

type FactorTable = BTreeMap<Category, BTreeMap<&'static str, EmissionFactor>>;

/// The full emission factor table, keyed by category then activity type.
///
/// The table is static, so clients may cache it.
async fn get_carbon_data() -> ([(header::HeaderName, &'static str); 1], Json<FactorTable>) {
    (
        [(header::CACHE_CONTROL, "public, max-age=86400")],
        Json(emission::table()),
    )
}

// ─── Activities ──────────────────────────────────────────────

/// An activity as returned to clients.
#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivityView {
    pub id: String,
    pub category: Category,
    pub activity_type: String,
    pub label: String,
    pub amount: f64,
    pub unit: String,
    /// Calendar day, "YYYY-MM-DD"
    pub date: String,
    pub co2_emission: f64,
    pub created_at: String,
}

impl ActivityView {
    fn new(activity: &Activity, calendar: &WeekCalendar) -> Self {
        Self {
            id: activity.id.clone(),
            category: activity.category,
            activity_type: activity.activity_type.clone(),
            label: activity.label.clone(),
            amount: activity.amount,
            unit: activity.unit.clone(),
            date: calendar.local_date(activity.date).to_string(),
            co2_emission: round2(activity.co2_emission),
            created_at: format_utc_rfc3339(activity.created_at),
        }
    }
}

/// Body of `POST /api/activities`.
#[derive(Deserialize, Validate)]
struct CreateActivityRequest {
    category: String,
    #[validate(length(min = 1, max = 64))]
    activity_type: String,
    #[validate(range(exclusive_min = 0.0))]
    amount: f64,
    date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct CreateActivityResponse {
    pub activity: ActivityView,
    /// Absent when the activity was stored but the insight refresh failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insight: Option<InsightResponse>,
    /// Present when the activity counted toward this week's goal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<GoalView>,
}

fn parse_category(raw: &str) -> Result<Category> {
    raw.parse()
        .map_err(|e: crate::models::category::UnknownCategory| AppError::BadRequest(e.to_string()))
}

/// Log an activity; refreshes the insight and this week's goal.
async fn create_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateActivityRequest>,
) -> Result<(StatusCode, Json<CreateActivityResponse>)> {
    body.validate()?;

    let request = NewActivity {
        category: parse_category(&body.category)?,
        activity_type: body.activity_type,
        amount: body.amount,
        date: body.date,
    };

    let result = state
        .activity_processor()
        .log_activity(&user.user_id, request, Utc::now())
        .await?;

    let calendar = state.config.calendar();
    Ok((
        StatusCode::CREATED,
        Json(CreateActivityResponse {
            activity: ActivityView::new(&result.activity, &calendar),
            insight: result.insight.as_ref().map(InsightResponse::from),
            goal: result.goal.as_ref().map(|update| GoalView::from(&update.goal)),
        }),
    ))
}

#[derive(Deserialize)]
struct ActivitiesQuery {
    /// Filter by category name
    category: Option<String>,
    /// First day to include, "YYYY-MM-DD"
    start_date: Option<NaiveDate>,
    /// Last day to include, "YYYY-MM-DD"
    end_date: Option<NaiveDate>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivitiesResponse {
    pub activities: Vec<ActivityView>,
    pub total: u32,
}

/// Get user's activities with optional filtering, newest first.
async fn get_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ActivitiesQuery>,
) -> Result<Json<ActivitiesResponse>> {
    tracing::debug!(
        user_id = %user.user_id,
        category = ?params.category,
        start_date = ?params.start_date,
        end_date = ?params.end_date,
        "Fetching activities"
    );

    if let (Some(start), Some(end)) = (params.start_date, params.end_date) {
        if start > end {
            return Err(AppError::BadRequest(
                "start_date must not be after end_date".to_string(),
            ));
        }
    }

    let calendar = state.config.calendar();
    let filter = ActivityFilter {
        from: params.start_date.map(|d| calendar.day_start(d)),
        // end_date is inclusive; the filter bound is not
        to: params
            .end_date
            .map(|d| calendar.day_start(d) + Duration::days(1)),
        category: params.category.as_deref().map(parse_category).transpose()?,
    };

    let activities = state.db.find_activities(&user.user_id, &filter).await?;

    Ok(Json(ActivitiesResponse {
        total: activities.len() as u32,
        activities: activities
            .iter()
            .map(|a| ActivityView::new(a, &calendar))
            .collect(),
    }))
}

#[derive(Serialize)]
pub struct DeleteActivityResponse {
    pub success: bool,
}

/// Delete one of the user's activities.
async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<String>,
) -> Result<Json<DeleteActivityResponse>> {
    if !state.db.delete_activity(&user.user_id, &activity_id).await? {
        return Err(AppError::NotFound(format!("Activity {}", activity_id)));
    }

    tracing::info!(user_id = %user.user_id, activity_id = %activity_id, "Activity deleted");
    Ok(Json(DeleteActivityResponse { success: true }))
}

// ─── Dashboard ───────────────────────────────────────────────

#[derive(Serialize, Debug, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DailyTotal {
    pub date: String,
    pub total: f64,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    /// All-time kg CO2e
    pub user_total: f64,
    pub activity_count: u32,
    /// One entry per day for the last week, oldest first
    pub daily: Vec<DailyTotal>,
    /// All-time totals per category
    pub categories: Vec<CategoryBreakdown>,
    pub latest_insight: Option<InsightView>,
    pub current_goal: Option<GoalView>,
}

/// Zero-filled per-day totals for the `days` days ending today.
fn recent_daily_totals(
    activities: &[Activity],
    calendar: &WeekCalendar,
    today: NaiveDate,
    days: i64,
) -> Vec<DailyTotal> {
    let sums = daily_totals(activities, calendar.offset);
    (0..days)
        .rev()
        .map(|back| {
            let date = (today - Duration::days(back)).to_string();
            let total = sums.get(&date).copied().unwrap_or(0.0);
            DailyTotal {
                date,
                total: round2(total),
            }
        })
        .collect()
}

/// Summary figures for the user's dashboard.
///
/// Read-only: shows the latest stored insight and this week's goal if
/// one exists, without generating either.
async fn get_dashboard_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DashboardResponse>> {
    let now = Utc::now();
    let calendar = state.config.calendar();

    let activities = state
        .db
        .find_activities(&user.user_id, &ActivityFilter::default())
        .await?;
    let totals = EmissionTotals::from_activities(&activities);

    let latest_insight = state.db.find_latest_insight(&user.user_id).await?;

    let week_start = calendar.week_start(now);
    let current_goal = match state.db.find_active_goal(&user.user_id, week_start).await? {
        Some(goal) => Some(goal),
        None => state.db.find_goal_for_week(&user.user_id, week_start).await?,
    };

    let categories = totals
        .breakdown()
        .into_iter()
        .map(|b| CategoryBreakdown {
            total: round2(b.total),
            ..b
        })
        .collect();

    Ok(Json(DashboardResponse {
        user_total: round2(totals.total()),
        activity_count: totals.count(),
        daily: recent_daily_totals(
            &activities,
            &calendar,
            calendar.local_date(now),
            DASHBOARD_DAYS,
        ),
        categories,
        latest_insight: latest_insight.as_ref().map(InsightView::from),
        current_goal: current_goal.as_ref().map(GoalView::from),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_recent_daily_totals_are_zero_filled() {
        let calendar = WeekCalendar::default();
        let day = |d: u32| Utc.with_ymd_and_hms(2026, 10, d, 0, 0, 0).unwrap();
        let make = |id: &str, d: u32, co2: f64| Activity {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            category: Category::Energy,
            activity_type: "electricity".to_string(),
            label: "Electricity Usage".to_string(),
            amount: 1.0,
            unit: "kWh".to_string(),
            date: day(d),
            co2_emission: co2,
            created_at: day(d),
        };
        let activities = vec![make("a", 21, 1.234), make("b", 19, 2.0), make("c", 10, 9.0)];
        let today = NaiveDate::from_ymd_opt(2026, 10, 21).unwrap();

        let daily = recent_daily_totals(&activities, &calendar, today, 7);

        assert_eq!(daily.len(), 7);
        assert_eq!(daily[0].date, "2026-10-15");
        assert_eq!(daily[4].total, 2.0);
        assert_eq!(daily[5].total, 0.0);
        assert_eq!(
            daily[6],
            DailyTotal {
                date: "2026-10-21".to_string(),
                total: 1.23
            }
        );
    }

    #[test]
    fn test_parse_category_rejects_unknown() {
        assert_eq!(parse_category("food").unwrap(), Category::Food);
        assert!(matches!(
            parse_category("aviation"),
            Err(AppError::BadRequest(_))
        ));
    }
}
