// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Threshold-based tip selection.
//!
//! Each category has a table of tips in ascending threshold order. The
//! selected tip is the one with the largest threshold not exceeding the
//! emission; emissions below the first threshold get the first tip.

use crate::models::Category;
use serde::Serialize;

/// One row of a tip table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tip {
    /// kg CO2e at which this tip starts to apply
    pub threshold: f64,
    pub tip: &'static str,
    pub action: &'static str,
    /// kg CO2e per week the action could save
    pub reduction: f64,
}

const fn tip(threshold: f64, tip: &'static str, action: &'static str, reduction: f64) -> Tip {
    Tip {
        threshold,
        tip,
        action,
        reduction,
    }
}

static TRANSPORT_TIPS: [Tip; 4] = [
    tip(
        10.0,
        "Try cycling or walking for short trips to cut transport emissions by 100%",
        "cycle/walk",
        2.0,
    ),
    tip(
        20.0,
        "Consider taking the bus or train instead of driving twice this week",
        "public transport",
        3.0,
    ),
    tip(
        50.0,
        "Carpooling can reduce your travel emissions by 50%",
        "carpool",
        5.0,
    ),
    tip(
        100.0,
        "Working from home 2 days a week could save 10kg CO2",
        "work from home",
        10.0,
    ),
];

static FOOD_TIPS: [Tip; 4] = [
    tip(
        5.0,
        "Try one plant-based meal this week to reduce food emissions",
        "plant-based meal",
        2.0,
    ),
    tip(
        10.0,
        "Reducing beef consumption by 50% could save 5kg CO2 weekly",
        "less beef",
        5.0,
    ),
    tip(
        20.0,
        "Consider Meatless Mondays - it can cut 3kg CO2 per week",
        "meatless monday",
        3.0,
    ),
    tip(
        30.0,
        "Switching to chicken instead of beef saves 20kg CO2 per kg",
        "switch proteins",
        8.0,
    ),
];

static ENERGY_TIPS: [Tip; 4] = [
    tip(
        5.0,
        "Turn off lights when leaving rooms - save 0.5kg CO2 daily",
        "lights off",
        3.5,
    ),
    tip(
        10.0,
        "Lower your thermostat by 1°C to save 2kg CO2 weekly",
        "lower heating",
        2.0,
    ),
    tip(
        20.0,
        "Unplug devices when not in use - reduce standby power consumption",
        "unplug devices",
        4.0,
    ),
    tip(
        50.0,
        "Consider switching to LED bulbs - save up to 5kg CO2 weekly",
        "LED bulbs",
        5.0,
    ),
];

static OTHER_TIPS: [Tip; 3] = [
    tip(
        5.0,
        "Start composting to reduce waste emissions by 30%",
        "composting",
        2.0,
    ),
    tip(
        10.0,
        "Buy second-hand clothing instead of new to save 10kg CO2 per item",
        "second-hand",
        10.0,
    ),
    tip(
        20.0,
        "Repair electronics instead of replacing - save 100kg CO2",
        "repair",
        20.0,
    ),
];

/// Tip table for a category, ascending by threshold.
pub fn tips_for(category: Category) -> &'static [Tip] {
    match category {
        Category::Transport => &TRANSPORT_TIPS,
        Category::Food => &FOOD_TIPS,
        Category::Energy => &ENERGY_TIPS,
        Category::Other => &OTHER_TIPS,
    }
}

/// Select the tip for an emission magnitude.
pub fn select_tip(category: Category, emission: f64) -> &'static Tip {
    let table = tips_for(category);
    let mut selected = &table[0];
    for entry in table {
        if emission >= entry.threshold {
            selected = entry;
        }
    }
    selected
}

/// Select a tip by category name; unrecognized names use the `other` table.
pub fn select_tip_by_key(category: &str, emission: f64) -> &'static Tip {
    let category = category.parse().unwrap_or(Category::Other);
    select_tip(category, emission)
}
