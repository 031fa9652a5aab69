// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Insight routes.

use crate::db::InsightRepository;
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::stats::round2;
use crate::models::{Category, Insight};
use crate::services::notify::{events, NotificationSink};
use crate::services::{InsightOutcome, InsightSummary};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const NO_DATA_MESSAGE: &str = "Log some activities to get personalized insights!";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/insights/current", get(get_current_insight))
        .route("/api/insights/generate", post(generate_insight))
        .route("/api/insights/history", get(get_insight_history))
}

/// An insight as returned to clients. Emission figures are rounded to
/// two decimals.
#[derive(Serialize, Debug, Clone)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct InsightView {
    pub insight_id: String,
    pub generated_at: String,
    pub highest_category: Category,
    pub highest_emission: f64,
    pub total_emissions: f64,
    pub category_breakdown: BTreeMap<String, f64>,
    pub tip: String,
    pub action: String,
    pub potential_reduction: f64,
    pub viewed: bool,
}

impl From<&Insight> for InsightView {
    fn from(insight: &Insight) -> Self {
        Self {
            insight_id: insight.id.clone(),
            generated_at: format_utc_rfc3339(insight.generated_at),
            highest_category: insight.highest_category,
            highest_emission: round2(insight.highest_emission()),
            total_emissions: round2(insight.total_emissions),
            category_breakdown: insight
                .category_emissions
                .iter()
                .map(|(k, v)| (k.clone(), round2(*v)))
                .collect(),
            tip: insight.tip.clone(),
            action: insight.action.clone(),
            potential_reduction: insight.potential_reduction,
            viewed: insight.viewed,
        }
    }
}

impl From<&InsightSummary> for InsightView {
    fn from(summary: &InsightSummary) -> Self {
        Self {
            insight_id: summary.insight_id.clone(),
            generated_at: format_utc_rfc3339(summary.generated_at),
            highest_category: summary.highest_category,
            highest_emission: round2(summary.highest_emission),
            total_emissions: round2(summary.total_emissions),
            category_breakdown: summary
                .category_breakdown
                .iter()
                .map(|b| (b.category.as_str().to_string(), round2(b.total)))
                .collect(),
            tip: summary.tip.clone(),
            action: summary.action.clone(),
            potential_reduction: summary.potential_reduction,
            viewed: false,
        }
    }
}

/// Insight response; `has_data` is false when there is nothing to say yet.
#[derive(Serialize, Debug)]
pub struct InsightResponse {
    pub has_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub insight: Option<InsightView>,
}

impl InsightResponse {
    pub fn no_data() -> Self {
        Self {
            has_data: false,
            message: Some(NO_DATA_MESSAGE.to_string()),
            insight: None,
        }
    }

    pub fn with(insight: InsightView) -> Self {
        Self {
            has_data: true,
            message: None,
            insight: Some(insight),
        }
    }
}

impl From<&InsightOutcome> for InsightResponse {
    fn from(outcome: &InsightOutcome) -> Self {
        match outcome {
            InsightOutcome::NoData => Self::no_data(),
            InsightOutcome::Generated(summary) => Self::with(summary.into()),
        }
    }
}

/// Latest stored insight. Does not generate a new one.
async fn get_current_insight(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<InsightResponse>> {
    let latest = state.db.find_latest_insight(&user.user_id).await?;

    Ok(Json(match latest {
        Some(insight) => InsightResponse::with((&insight).into()),
        None => InsightResponse::no_data(),
    }))
}

/// Generate a fresh insight over the trailing window.
async fn generate_insight(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<InsightResponse>> {
    let outcome = state
        .insight_generator()
        .generate(&user.user_id, chrono::Utc::now())
        .await?;

    if let InsightOutcome::Generated(summary) = &outcome {
        state
            .hub
            .emit(&user.user_id, events::NEW_INSIGHT, summary.to_payload());
    }

    Ok(Json((&outcome).into()))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct InsightHistoryResponse {
    pub insights: Vec<InsightView>,
}

/// Most recent insights, newest first.
async fn get_insight_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<InsightHistoryResponse>> {
    let insights = state
        .db
        .find_insight_history(&user.user_id, state.config.history_limit)
        .await?;

    tracing::debug!(user_id = %user.user_id, count = insights.len(), "Fetched insight history");

    Ok(Json(InsightHistoryResponse {
        insights: insights.iter().map(InsightView::from).collect(),
    }))
}
