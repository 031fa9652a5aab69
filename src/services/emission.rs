// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Static emission factor table.
//!
//! Maps `(category, activity_type)` to a kg CO2e multiplier per unit.
//! Activities are priced once at creation; changing a factor here never
//! touches stored activities.

use crate::models::Category;
use serde::Serialize;
use std::collections::BTreeMap;

/// Emission factor for one activity type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmissionFactor {
    /// Activity type key (e.g. "car")
    #[serde(skip)]
    pub activity_type: &'static str,
    /// kg CO2e per unit
    pub value: f64,
    /// Display unit, e.g. "kg per km"
    pub unit: &'static str,
    pub label: &'static str,
}

impl EmissionFactor {
    /// The unit an amount is measured in ("km" for "kg per km").
    pub fn amount_unit(&self) -> &'static str {
        self.unit
            .split_once(" per ")
            .map(|(_, unit)| unit)
            .unwrap_or(self.unit)
    }

    /// Emission for `amount` units.
    pub fn emission_for(&self, amount: f64) -> f64 {
        self.value * amount
    }
}

/// Error for activity types missing from the table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown activity type '{activity_type}' for category '{category}'")]
pub struct LookupError {
    pub category: Category,
    pub activity_type: String,
}

const fn factor(
    activity_type: &'static str,
    value: f64,
    unit: &'static str,
    label: &'static str,
) -> EmissionFactor {
    EmissionFactor {
        activity_type,
        value,
        unit,
        label,
    }
}

static TRANSPORT: [EmissionFactor; 6] = [
    factor("car", 0.12, "kg per km", "Car Travel"),
    factor("bus", 0.03, "kg per km", "Bus Travel"),
    factor("train", 0.01, "kg per km", "Train Travel"),
    factor("plane", 0.25, "kg per km", "Air Travel"),
    factor("bicycle", 0.0, "kg per km", "Cycling"),
    factor("walking", 0.0, "kg per km", "Walking"),
];

static FOOD: [EmissionFactor; 8] = [
    factor("beef", 27.0, "kg per kg", "Beef Consumption"),
    factor("lamb", 39.0, "kg per kg", "Lamb Consumption"),
    factor("pork", 12.0, "kg per kg", "Pork Consumption"),
    factor("chicken", 6.9, "kg per kg", "Chicken Consumption"),
    factor("fish", 6.0, "kg per kg", "Fish Consumption"),
    factor("dairy", 1.9, "kg per kg", "Dairy Products"),
    factor("vegetables", 0.4, "kg per kg", "Vegetables"),
    factor("fruits", 0.5, "kg per kg", "Fruits"),
];

static ENERGY: [EmissionFactor; 4] = [
    factor("electricity", 0.5, "kg per kWh", "Electricity Usage"),
    factor("naturalGas", 0.2, "kg per kWh", "Natural Gas Usage"),
    factor("lpg", 0.25, "kg per kWh", "LPG Usage"),
    factor("wood", 0.02, "kg per kg", "Wood Burning"),
];

static OTHER: [EmissionFactor; 4] = [
    factor("waste", 0.7, "kg per kg", "Waste Production"),
    factor("water", 0.001, "kg per liter", "Water Usage"),
    factor("clothing", 10.0, "kg per item", "New Clothing Item"),
    factor("electronics", 100.0, "kg per item", "New Electronic Device"),
];

/// All factors for one category.
pub fn factors(category: Category) -> &'static [EmissionFactor] {
    match category {
        Category::Transport => &TRANSPORT,
        Category::Food => &FOOD,
        Category::Energy => &ENERGY,
        Category::Other => &OTHER,
    }
}

/// Look up the factor for an activity type.
pub fn lookup(
    category: Category,
    activity_type: &str,
) -> Result<&'static EmissionFactor, LookupError> {
    factors(category)
        .iter()
        .find(|f| f.activity_type == activity_type)
        .ok_or_else(|| LookupError {
            category,
            activity_type: activity_type.to_string(),
        })
}

/// The whole table as nested maps (category -> type -> factor).
pub fn table() -> BTreeMap<Category, BTreeMap<&'static str, EmissionFactor>> {
    Category::ALL
        .iter()
        .map(|&category| {
            let entries = factors(category)
                .iter()
                .map(|f| (f.activity_type, *f))
                .collect();
            (category, entries)
        })
        .collect()
}
