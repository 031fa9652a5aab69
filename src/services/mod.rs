// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activity;
pub mod emission;
pub mod goals;
pub mod insight;
pub mod notify;
pub mod tips;

pub use activity::{ActivityProcessor, LogResult, NewActivity};
pub use goals::GoalManager;
pub use insight::{InsightGenerator, InsightOutcome, InsightSummary};
pub use notify::{Notification, NotificationHub, NotificationSink};
