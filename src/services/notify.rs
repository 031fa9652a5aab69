// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user push notifications.
//!
//! The engine reports state changes (`new_insight`, `new_goal`,
//! `goal_completed`, `goal_failed`) through a [`NotificationSink`].
//! Delivery is best effort: a user with no open connection simply misses
//! the event, and the operation that produced it is never affected.

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

/// Buffered events per user before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 32;

pub mod events {
    pub const NEW_INSIGHT: &str = "new_insight";
    pub const NEW_GOAL: &str = "new_goal";
    pub const GOAL_COMPLETED: &str = "goal_completed";
    pub const GOAL_FAILED: &str = "goal_failed";
}

/// A single event pushed to a user's connections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub event: String,
    pub payload: serde_json::Value,
}

/// Receiver of engine events.
pub trait NotificationSink: Send + Sync {
    /// Deliver an event to one user. Must not block or fail.
    fn emit(&self, user_id: &str, event: &str, payload: serde_json::Value);
}

/// Sink that drops every event.
pub struct NullSink;

impl NotificationSink for NullSink {
    fn emit(&self, _user_id: &str, _event: &str, _payload: serde_json::Value) {}
}

/// Fan-out of events to every open connection of a user.
#[derive(Default)]
pub struct NotificationHub {
    channels: DashMap<String, broadcast::Sender<Notification>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a user's events.
    pub fn subscribe(&self, user_id: &str) -> broadcast::Receiver<Notification> {
        self.channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Number of open subscriptions for a user.
    pub fn subscriber_count(&self, user_id: &str) -> usize {
        self.channels
            .get(user_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Number of users with an open channel.
    pub fn connected_users(&self) -> usize {
        self.channels.len()
    }

    /// Drop a user's channel once its last subscriber has gone.
    pub fn prune(&self, user_id: &str) {
        self.channels
            .remove_if(user_id, |_, tx| tx.receiver_count() == 0);
    }
}

impl NotificationSink for NotificationHub {
    fn emit(&self, user_id: &str, event: &str, payload: serde_json::Value) {
        let Some(tx) = self.channels.get(user_id) else {
            tracing::debug!(user_id, event, "No subscribers, dropping notification");
            return;
        };

        let notification = Notification {
            event: event.to_string(),
            payload,
        };
        if tx.send(notification).is_err() {
            tracing::debug!(user_id, event, "All subscribers gone, dropping notification");
        }
    }
}
