//! Text rendering of calorie reports and stored profiles.

use crate::formulas::CalorieReport;
use crate::localization::{Language, Localizer};
use crate::profile::{Field, ProfileDraft};

/// Render a calorie report: a title line, then one block per method
///
/// Each block is `"<name>: <kcal> kcal"` with the value to two decimals, optionally
/// followed by an indented description line. Blocks are separated by blank lines.
pub fn format_report(report: &CalorieReport, language: Language, localizer: &dyn Localizer) -> String {
    let mut result = localizer.message("report-calorie-title", language);
    result.push_str("\n\n");

    for (method, kcal) in report.entries() {
        result.push_str(&format!("{}: {kcal:.2} kcal\n", localizer.method_name(method, language)));
        if let Some(description) = localizer.method_description(method, language) {
            result.push_str(&format!("  - {description}\n"));
        }
        result.push('\n');
    }

    result.trim_end().to_string()
}

/// Render the stored profile with localized labels and units
pub fn format_profile(draft: &ProfileDraft, language: Language, localizer: &dyn Localizer) -> String {
    let mut lines = vec![localizer.message("profile-title", language), String::new()];

    for field in Field::SEQUENCE {
        let value = format_field_value(draft, field, language, localizer)
            .unwrap_or_else(|| localizer.message("profile-not-specified", language));
        lines.push(format!("{}: {value}", localizer.field_label(field, language)));
    }

    lines.join("\n")
}

/// Localized value of one field, `None` when unset
pub fn format_field_value(
    draft: &ProfileDraft,
    field: Field,
    language: Language,
    localizer: &dyn Localizer,
) -> Option<String> {
    let unit = |key: &str| localizer.message(key, language);
    match field {
        Field::Sex => draft
            .sex
            .map(|sex| localizer.message(&format!("sex-{}", sex.key()), language)),
        Field::Height => draft.height_cm.map(|v| format!("{v} {}", unit("unit-height"))),
        Field::Weight => draft.weight_kg.map(|v| format!("{v} {}", unit("unit-weight"))),
        Field::Age => draft
            .age_years
            .map(|age| localizer.message_with_count("unit-age", language, u64::from(age))),
        Field::BodyFat => draft.body_fat_percent.map(|v| format!("{v} %")),
        Field::ActivityLevel => draft
            .activity_level
            .map(|level| localizer.message(&format!("activity-{}", level.key()), language)),
        Field::MainGoal => draft
            .main_goal
            .map(|goal| localizer.message(&format!("goal-{}", goal.key()), language)),
    }
}
