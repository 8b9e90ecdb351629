use std::path::Path;

use calorizer::formulas::{compute_report, CalorieMethod};
use calorizer::localization::{Language, LocalizationManager, Localizer};
use calorizer::profile::{ActivityLevel, Field, MainGoal, PhysicalProfile, ProfileDraft, Sex};
use calorizer::report::{format_field_value, format_profile, format_report};

fn localizer() -> LocalizationManager {
    LocalizationManager::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("locales"))
        .expect("Failed to load locales")
}

fn profile() -> PhysicalProfile {
    PhysicalProfile {
        sex: Sex::Male,
        height_cm: 175.0,
        weight_kg: 70.0,
        age_years: 30,
        body_fat_percent: 15.0,
        activity_level: ActivityLevel::Sedentary,
        main_goal: MainGoal::Maintenance,
    }
}

#[test]
fn test_report_layout() {
    let loc = localizer();
    let text = format_report(&compute_report(&profile()), Language::English, &loc);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], loc.message("report-calorie-title", Language::English));
    assert_eq!(lines[1], "");
    assert_eq!(lines[2], "Harris-Benedict: 2034.80 kcal");
    assert!(lines[3].starts_with("  - "));
    assert_eq!(lines[4], "");
    assert_eq!(lines[5], "Mifflin-St Jeor: 1978.50 kcal");
    assert_eq!(lines[8], "Katch-McArdle: 1655.20 kcal");
    assert_eq!(lines[11], "Tom Venuto: 1978.50 kcal");
    assert!(!text.ends_with('\n'));
}

#[test]
fn test_report_lists_methods_in_order_for_every_language() {
    let loc = localizer();
    let report = compute_report(&profile());
    for language in Language::ALL {
        let text = format_report(&report, language, &loc);
        let positions: Vec<usize> = CalorieMethod::ALL
            .iter()
            .map(|method| {
                text.find(&loc.method_name(*method, language))
                    .expect("method name present")
            })
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{text}");
        assert_eq!(text.matches(" kcal").count(), 4);
    }
}

#[test]
fn test_profile_shows_unset_fields() {
    let loc = localizer();
    let draft = ProfileDraft {
        sex: Some(Sex::Female),
        age_years: Some(1),
        ..Default::default()
    };
    let text = format_profile(&draft, Language::English, &loc);

    assert!(text.starts_with(&loc.message("profile-title", Language::English)));
    assert!(text.contains("Sex: Female"));
    assert!(text.contains("Age: 1 year"));
    assert!(text.contains("Height: not specified"));
    assert!(text.contains("Main goal: not specified"));
    assert_eq!(text.lines().count(), 2 + Field::SEQUENCE.len());
}

#[test]
fn test_field_values_are_localized() {
    let loc = localizer();
    let draft = ProfileDraft::from(profile());

    assert_eq!(
        format_field_value(&draft, Field::Height, Language::German, &loc),
        Some("175 cm".to_string())
    );
    assert_eq!(
        format_field_value(&draft, Field::BodyFat, Language::English, &loc),
        Some("15 %".to_string())
    );
    assert_eq!(
        format_field_value(&draft, Field::ActivityLevel, Language::Russian, &loc),
        Some("Сидячий".to_string())
    );
    assert_eq!(
        format_field_value(&draft, Field::Age, Language::Ukrainian, &loc),
        Some("30 років".to_string())
    );
    assert_eq!(
        format_field_value(&ProfileDraft::default(), Field::Weight, Language::English, &loc),
        None
    );
}
