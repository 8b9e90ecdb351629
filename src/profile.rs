//! # Physical Profile Data Model
//!
//! Types describing the seven physical attributes collected from a user:
//! sex, height, weight, age, body fat, activity level and main goal.
//!
//! ## Core Concepts
//!
//! - **Field**: one collectable attribute, in the fixed order the questions are asked
//! - **FieldValue**: a validated value for exactly one field
//! - **ProfileDraft**: a partially filled profile, mutated field by field
//! - **PhysicalProfile**: a complete profile, the only input the formulas accept
//!
//! ## Usage
//!
//! ```rust
//! use calorizer::profile::{ActivityLevel, FieldValue, MainGoal, PhysicalProfile, ProfileDraft, Sex};
//!
//! let mut draft = ProfileDraft::default();
//! draft.apply(FieldValue::Sex(Sex::Female));
//! assert!(PhysicalProfile::try_from(&draft).is_err());
//!
//! draft.apply(FieldValue::HeightCm(165.0));
//! draft.apply(FieldValue::WeightKg(60.0));
//! draft.apply(FieldValue::AgeYears(28));
//! draft.apply(FieldValue::BodyFatPercent(22.0));
//! draft.apply(FieldValue::ActivityLevel(ActivityLevel::Moderate));
//! draft.apply(FieldValue::MainGoal(MainGoal::Maintenance));
//! assert!(PhysicalProfile::try_from(&draft).is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::IncompleteProfileError;

/// Biological sex, used to pick the formula branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Stable name used for storage and localization keys
    pub fn key(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "male" => Some(Sex::Male),
            "female" => Some(Sex::Female),
            _ => None,
        }
    }
}

/// Physical activity level with its TDEE multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityLevel {
    /// Little or no exercise
    Sedentary,
    /// Light exercise 1-3 days a week
    Light,
    /// Moderate exercise 3-5 days a week
    Moderate,
    /// Hard exercise 6-7 days a week
    Active,
    /// Physical job or training twice a day
    VeryActive,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 5] = [
        ActivityLevel::Sedentary,
        ActivityLevel::Light,
        ActivityLevel::Moderate,
        ActivityLevel::Active,
        ActivityLevel::VeryActive,
    ];

    /// Multiplicative factor applied to a basal metabolic rate
    pub const fn factor(&self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::Light => "light",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::Active => "active",
            ActivityLevel::VeryActive => "very-active",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.key() == key)
    }
}

/// Main goal with its calorie adjustment factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MainGoal {
    WeightLoss,
    Maintenance,
    WeightGain,
}

impl MainGoal {
    pub const ALL: [MainGoal; 3] = [MainGoal::WeightLoss, MainGoal::Maintenance, MainGoal::WeightGain];

    pub const fn factor(&self) -> f64 {
        match self {
            MainGoal::WeightLoss => 0.8,
            MainGoal::Maintenance => 1.0,
            MainGoal::WeightGain => 1.1,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            MainGoal::WeightLoss => "weight-loss",
            MainGoal::Maintenance => "maintenance",
            MainGoal::WeightGain => "weight-gain",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|goal| goal.key() == key)
    }
}

/// One collectable profile attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Sex,
    Height,
    Weight,
    Age,
    BodyFat,
    ActivityLevel,
    MainGoal,
}

impl Field {
    /// Question order of the sequential flow
    pub const SEQUENCE: [Field; 7] = [
        Field::Sex,
        Field::Height,
        Field::Weight,
        Field::Age,
        Field::BodyFat,
        Field::ActivityLevel,
        Field::MainGoal,
    ];

    /// Field asked after this one, `None` for the last field
    pub fn next(&self) -> Option<Field> {
        let position = Self::SEQUENCE.iter().position(|field| field == self)?;
        Self::SEQUENCE.get(position + 1).copied()
    }

    /// Key fragment shared by localization messages (`question-<key>`, `error-<key>-invalid`)
    pub fn key(&self) -> &'static str {
        match self {
            Field::Sex => "sex",
            Field::Height => "height",
            Field::Weight => "weight",
            Field::Age => "age",
            Field::BodyFat => "body-fat",
            Field::ActivityLevel => "activity-level",
            Field::MainGoal => "main-goal",
        }
    }

    /// Selection signal sent by the attribute keyboard
    pub fn selection_signal(&self) -> &'static str {
        match self {
            Field::Sex => "UPDATE_SEX",
            Field::Height => "UPDATE_HEIGHT",
            Field::Weight => "UPDATE_WEIGHT",
            Field::Age => "UPDATE_AGE",
            Field::BodyFat => "UPDATE_BODY_FAT",
            Field::ActivityLevel => "UPDATE_ACTIVITY_LEVEL",
            Field::MainGoal => "UPDATE_MAIN_GOAL",
        }
    }

    pub fn from_selection_signal(signal: &str) -> Option<Field> {
        Self::SEQUENCE
            .into_iter()
            .find(|field| field.selection_signal() == signal)
    }

    /// Fields answered by picking a numbered option from the question text
    pub fn lists_options(&self) -> bool {
        matches!(self, Field::ActivityLevel | Field::MainGoal)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A validated value for a single field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Sex(Sex),
    HeightCm(f64),
    WeightKg(f64),
    AgeYears(u32),
    BodyFatPercent(f64),
    ActivityLevel(ActivityLevel),
    MainGoal(MainGoal),
}

impl FieldValue {
    pub fn field(&self) -> Field {
        match self {
            FieldValue::Sex(_) => Field::Sex,
            FieldValue::HeightCm(_) => Field::Height,
            FieldValue::WeightKg(_) => Field::Weight,
            FieldValue::AgeYears(_) => Field::Age,
            FieldValue::BodyFatPercent(_) => Field::BodyFat,
            FieldValue::ActivityLevel(_) => Field::ActivityLevel,
            FieldValue::MainGoal(_) => Field::MainGoal,
        }
    }
}

/// Partially filled profile, as stored in a session or in the database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub sex: Option<Sex>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub age_years: Option<u32>,
    pub body_fat_percent: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub main_goal: Option<MainGoal>,
}

impl ProfileDraft {
    /// Write one validated value, leaving every other field untouched
    pub fn apply(&mut self, value: FieldValue) {
        match value {
            FieldValue::Sex(sex) => self.sex = Some(sex),
            FieldValue::HeightCm(height) => self.height_cm = Some(height),
            FieldValue::WeightKg(weight) => self.weight_kg = Some(weight),
            FieldValue::AgeYears(age) => self.age_years = Some(age),
            FieldValue::BodyFatPercent(body_fat) => self.body_fat_percent = Some(body_fat),
            FieldValue::ActivityLevel(level) => self.activity_level = Some(level),
            FieldValue::MainGoal(goal) => self.main_goal = Some(goal),
        }
    }

    pub fn is_set(&self, field: Field) -> bool {
        match field {
            Field::Sex => self.sex.is_some(),
            Field::Height => self.height_cm.is_some(),
            Field::Weight => self.weight_kg.is_some(),
            Field::Age => self.age_years.is_some(),
            Field::BodyFat => self.body_fat_percent.is_some(),
            Field::ActivityLevel => self.activity_level.is_some(),
            Field::MainGoal => self.main_goal.is_some(),
        }
    }

    pub fn missing_fields(&self) -> Vec<Field> {
        Field::SEQUENCE
            .into_iter()
            .filter(|field| !self.is_set(*field))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// A profile with all seven attributes set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalProfile {
    pub sex: Sex,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub age_years: u32,
    pub body_fat_percent: f64,
    pub activity_level: ActivityLevel,
    pub main_goal: MainGoal,
}

impl TryFrom<&ProfileDraft> for PhysicalProfile {
    type Error = IncompleteProfileError;

    fn try_from(draft: &ProfileDraft) -> Result<Self, Self::Error> {
        match (
            draft.sex,
            draft.height_cm,
            draft.weight_kg,
            draft.age_years,
            draft.body_fat_percent,
            draft.activity_level,
            draft.main_goal,
        ) {
            (
                Some(sex),
                Some(height_cm),
                Some(weight_kg),
                Some(age_years),
                Some(body_fat_percent),
                Some(activity_level),
                Some(main_goal),
            ) => Ok(PhysicalProfile {
                sex,
                height_cm,
                weight_kg,
                age_years,
                body_fat_percent,
                activity_level,
                main_goal,
            }),
            _ => Err(IncompleteProfileError {
                missing: draft.missing_fields(),
            }),
        }
    }
}

impl From<PhysicalProfile> for ProfileDraft {
    fn from(profile: PhysicalProfile) -> Self {
        ProfileDraft {
            sex: Some(profile.sex),
            height_cm: Some(profile.height_cm),
            weight_kg: Some(profile.weight_kg),
            age_years: Some(profile.age_years),
            body_fat_percent: Some(profile.body_fat_percent),
            activity_level: Some(profile.activity_level),
            main_goal: Some(profile.main_goal),
        }
    }
}
