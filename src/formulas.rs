//! # Formula Engine
//!
//! Four closed-form daily calorie estimates computed from a complete
//! [`PhysicalProfile`]:
//!
//! - **Harris-Benedict**: revised 1984 equation, activity adjusted
//! - **Mifflin-St Jeor**: 1990 equation, activity adjusted
//! - **Katch-McArdle**: lean body mass based, not activity adjusted
//! - **Tom Venuto**: Mifflin-St Jeor result scaled by the goal factor
//!
//! Outputs are never clamped. Extreme inputs can produce implausible numbers;
//! range checks on the inputs are the only guard.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::profile::{PhysicalProfile, Sex};

/// The four calculation methods of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalorieMethod {
    HarrisBenedict,
    MifflinStJeor,
    KatchMcArdle,
    TomVenuto,
}

impl CalorieMethod {
    pub const ALL: [CalorieMethod; 4] = [
        CalorieMethod::HarrisBenedict,
        CalorieMethod::MifflinStJeor,
        CalorieMethod::KatchMcArdle,
        CalorieMethod::TomVenuto,
    ];

    /// Key used by localization messages (`method-<key>-name`)
    pub fn key(&self) -> &'static str {
        match self {
            CalorieMethod::HarrisBenedict => "harris-benedict",
            CalorieMethod::MifflinStJeor => "mifflin-st-jeor",
            CalorieMethod::KatchMcArdle => "katch-mcardle",
            CalorieMethod::TomVenuto => "tom-venuto",
        }
    }
}

/// kcal estimate per method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalorieReport {
    results: HashMap<CalorieMethod, f64>,
}

impl CalorieReport {
    pub fn get(&self, method: CalorieMethod) -> Option<f64> {
        self.results.get(&method).copied()
    }

    /// Entries in the fixed method order
    pub fn entries(&self) -> impl Iterator<Item = (CalorieMethod, f64)> + '_ {
        CalorieMethod::ALL
            .into_iter()
            .filter_map(|method| self.get(method).map(|kcal| (method, kcal)))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Compute all four estimates for a complete profile
pub fn compute_report(profile: &PhysicalProfile) -> CalorieReport {
    let results = CalorieMethod::ALL
        .into_iter()
        .map(|method| (method, compute(method, profile)))
        .collect();
    CalorieReport { results }
}

pub fn compute(method: CalorieMethod, profile: &PhysicalProfile) -> f64 {
    match method {
        CalorieMethod::HarrisBenedict => harris_benedict(profile),
        CalorieMethod::MifflinStJeor => mifflin_st_jeor(profile),
        CalorieMethod::KatchMcArdle => katch_mcardle(profile),
        CalorieMethod::TomVenuto => tom_venuto(profile),
    }
}

pub fn harris_benedict(p: &PhysicalProfile) -> f64 {
    let age = f64::from(p.age_years);
    let bmr = match p.sex {
        Sex::Male => 88.362 + 13.397 * p.weight_kg + 4.799 * p.height_cm - 5.677 * age,
        Sex::Female => 447.593 + 9.247 * p.weight_kg + 3.098 * p.height_cm - 4.330 * age,
    };
    bmr * p.activity_level.factor()
}

pub fn mifflin_st_jeor(p: &PhysicalProfile) -> f64 {
    let sex_offset = match p.sex {
        Sex::Male => 5.0,
        Sex::Female => -161.0,
    };
    let bmr = 10.0 * p.weight_kg + 6.25 * p.height_cm - 5.0 * f64::from(p.age_years) + sex_offset;
    bmr * p.activity_level.factor()
}

/// Lean-mass based BMR. Deliberately ignores the activity factor.
pub fn katch_mcardle(p: &PhysicalProfile) -> f64 {
    let lean_mass = p.weight_kg * (1.0 - p.body_fat_percent / 100.0);
    370.0 + 21.6 * lean_mass
}

/// Goal factor applied on top of the activity adjusted Mifflin-St Jeor value
pub fn tom_venuto(p: &PhysicalProfile) -> f64 {
    mifflin_st_jeor(p) * p.main_goal.factor()
}
