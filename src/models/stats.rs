//! Emission aggregates computed from activity history.
//!
//! These are folds over a caller-selected slice of activities; the
//! caller chooses the user and time window before aggregating.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{Activity, Category};

/// Per-category and total emission sums over a set of activities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmissionTotals {
    // ─── Per-Category Sums ───────────────────────────────────────
    /// kg CO2e per category, indexed by `Category::index`
    sums: [f64; 4],
    /// Activity count per category
    counts: [u32; 4],

    // ─── Ordering ────────────────────────────────────────────────
    /// Categories in the order they were first seen (argmax tie-break)
    first_seen: Vec<Category>,

    /// Total activities folded in
    count: u32,
}

impl EmissionTotals {
    /// Fold a sequence of activities into totals.
    pub fn from_activities<'a>(activities: impl IntoIterator<Item = &'a Activity>) -> Self {
        let mut totals = Self::default();
        for activity in activities {
            totals.add_activity(activity);
        }
        totals
    }

    /// Add a single activity to the running sums.
    pub fn add_activity(&mut self, activity: &Activity) {
        let idx = activity.category.index();
        if self.counts[idx] == 0 {
            self.first_seen.push(activity.category);
        }

        self.sums[idx] += activity.co2_emission;
        self.counts[idx] += 1;
        self.count += 1;
    }

    /// Number of activities aggregated.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Summed emission for one category (zero if never seen).
    pub fn emission(&self, category: Category) -> f64 {
        self.sums[category.index()]
    }

    /// Activity count for one category.
    pub fn activity_count(&self, category: Category) -> u32 {
        self.counts[category.index()]
    }

    /// Per-category sums in first-seen order.
    pub fn by_category(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        self.first_seen.iter().map(|&c| (c, self.sums[c.index()]))
    }

    /// Total emission.
    ///
    /// Defined as the sum of the per-category values so the two always
    /// agree exactly.
    pub fn total(&self) -> f64 {
        self.by_category().map(|(_, v)| v).sum()
    }

    /// Category with the largest positive emission.
    ///
    /// Ties go to the category seen first. `None` when nothing emitted.
    pub fn highest(&self) -> Option<(Category, f64)> {
        let mut best: Option<(Category, f64)> = None;
        for (category, emission) in self.by_category() {
            if emission <= 0.0 {
                continue;
            }
            match best {
                Some((_, top)) if emission <= top => {}
                _ => best = Some((category, emission)),
            }
        }
        best
    }

    /// Per-category sums keyed by category name, for storage.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.by_category()
            .map(|(c, v)| (c.as_str().to_string(), v))
            .collect()
    }

    /// Per-category totals and counts for dashboard display.
    pub fn breakdown(&self) -> Vec<CategoryBreakdown> {
        self.by_category()
            .map(|(category, total)| CategoryBreakdown {
                category,
                total,
                count: self.activity_count(category),
            })
            .collect()
    }
}

/// One category's share of a user's emissions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub category: Category,
    pub total: f64,
    pub count: u32,
}

/// Round a kg CO2e figure to two decimals for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sum emissions per calendar day ("YYYY-MM-DD"), sorted by day.
pub fn daily_totals<'a>(
    activities: impl IntoIterator<Item = &'a Activity>,
    offset: chrono::FixedOffset,
) -> BTreeMap<String, f64> {
    let mut days = BTreeMap::new();
    for activity in activities {
        let key = activity
            .date
            .with_timezone(&offset)
            .format("%Y-%m-%d")
            .to_string();
        *days.entry(key).or_insert(0.0) += activity.co2_emission;
    }
    days
}
