//! Input validation for the seven profile fields.

use crate::errors::{InvalidInputError, InvalidReason};
use crate::profile::{ActivityLevel, Field, FieldValue, MainGoal, Sex};

pub const HEIGHT_RANGE_CM: (f64, f64) = (50.0, 300.0);
pub const WEIGHT_RANGE_KG: (f64, f64) = (20.0, 500.0);
pub const AGE_RANGE_YEARS: (u32, u32) = (5, 120);
pub const BODY_FAT_RANGE_PERCENT: (f64, f64) = (0.0, 70.0);

/// Parse a raw chat answer for `field` and check it against the field's range
pub fn parse_and_validate(field: Field, raw: &str) -> Result<FieldValue, InvalidInputError> {
    let trimmed = raw.trim();
    let fail = |reason| InvalidInputError {
        field,
        reason,
        raw: raw.to_string(),
    };

    match field {
        Field::Sex => match trimmed {
            "1" => Ok(FieldValue::Sex(Sex::Male)),
            "2" => Ok(FieldValue::Sex(Sex::Female)),
            _ => Err(fail(InvalidReason::UnknownOption)),
        },
        Field::Height => parse_decimal_in(trimmed, HEIGHT_RANGE_CM)
            .map(FieldValue::HeightCm)
            .map_err(fail),
        Field::Weight => parse_decimal_in(trimmed, WEIGHT_RANGE_KG)
            .map(FieldValue::WeightKg)
            .map_err(fail),
        Field::Age => {
            let age: u32 = trimmed.parse().map_err(|_| fail(InvalidReason::NotANumber))?;
            if age < AGE_RANGE_YEARS.0 || age > AGE_RANGE_YEARS.1 {
                return Err(fail(InvalidReason::OutOfRange));
            }
            Ok(FieldValue::AgeYears(age))
        }
        Field::BodyFat => parse_decimal_in(trimmed, BODY_FAT_RANGE_PERCENT)
            .map(FieldValue::BodyFatPercent)
            .map_err(fail),
        Field::ActivityLevel => parse_option(trimmed, &ActivityLevel::ALL)
            .map(FieldValue::ActivityLevel)
            .ok_or_else(|| fail(InvalidReason::UnknownOption)),
        Field::MainGoal => parse_option(trimmed, &MainGoal::ALL)
            .map(FieldValue::MainGoal)
            .ok_or_else(|| fail(InvalidReason::UnknownOption)),
    }
}

/// Parse a decimal (dot or comma separator) and check it lies in `[min, max]`
fn parse_decimal_in(text: &str, (min, max): (f64, f64)) -> Result<f64, InvalidReason> {
    // Plain decimals only; "1e2" is not a height
    if text.contains(['e', 'E']) {
        return Err(InvalidReason::NotANumber);
    }
    let value: f64 = text
        .replace(',', ".")
        .parse()
        .map_err(|_| InvalidReason::NotANumber)?;

    // "NaN" and "inf" parse successfully but are not measurements
    if !value.is_finite() {
        return Err(InvalidReason::NotANumber);
    }
    if value < min || value > max {
        return Err(InvalidReason::OutOfRange);
    }
    Ok(value)
}

/// Map a 1-based option number onto `options`
fn parse_option<T: Copy>(text: &str, options: &[T]) -> Option<T> {
    // Only the bare digits shown in the question are accepted, not "+1" or "01"
    if text.len() != 1 {
        return None;
    }
    let index: usize = text.parse().ok()?;
    index.checked_sub(1).and_then(|i| options.get(i)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sex_literals() {
        assert_eq!(parse_and_validate(Field::Sex, "1"), Ok(FieldValue::Sex(Sex::Male)));
        assert_eq!(parse_and_validate(Field::Sex, " 2 "), Ok(FieldValue::Sex(Sex::Female)));
        assert!(parse_and_validate(Field::Sex, "3").is_err());
        assert!(parse_and_validate(Field::Sex, "male").is_err());
    }

    #[test]
    fn test_decimal_comma_is_accepted() {
        assert_eq!(
            parse_and_validate(Field::Weight, "72,5"),
            Ok(FieldValue::WeightKg(72.5))
        );
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        for raw in ["NaN", "inf", "-inf"] {
            let err = parse_and_validate(Field::Height, raw).unwrap_err();
            assert_eq!(err.reason, InvalidReason::NotANumber);
        }
    }

    #[test]
    fn test_option_parsing() {
        assert_eq!(
            parse_and_validate(Field::ActivityLevel, "5"),
            Ok(FieldValue::ActivityLevel(ActivityLevel::VeryActive))
        );
        assert!(parse_and_validate(Field::ActivityLevel, "0").is_err());
        assert!(parse_and_validate(Field::ActivityLevel, "6").is_err());
        assert!(parse_and_validate(Field::MainGoal, "4").is_err());
        assert!(parse_and_validate(Field::MainGoal, "+1").is_err());
    }
}
