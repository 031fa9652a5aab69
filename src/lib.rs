// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Footprint-Tracker: personal carbon footprint logging
//!
//! This crate provides the backend API for logging activities, pricing
//! their CO2e emissions, and deriving insights and weekly reduction goals
//! from each user's history.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::{ActivityProcessor, GoalManager, InsightGenerator, NotificationHub};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Store,
    pub hub: NotificationHub,
}

impl AppState {
    pub fn new(config: Config, db: Store) -> Self {
        Self {
            config,
            db,
            hub: NotificationHub::new(),
        }
    }

    pub fn insight_generator(&self) -> InsightGenerator<'_, Store> {
        InsightGenerator::new(
            &self.db,
            self.config.calendar(),
            self.config.insight_window_days,
        )
    }

    pub fn goal_manager(&self) -> GoalManager<'_, Store> {
        GoalManager::new(
            &self.db,
            self.config.calendar(),
            self.config.insight_window_days,
            &self.hub,
        )
    }

    pub fn activity_processor(&self) -> ActivityProcessor<'_, Store> {
        ActivityProcessor::new(
            &self.db,
            self.config.calendar(),
            self.config.insight_window_days,
            &self.hub,
        )
    }
}
