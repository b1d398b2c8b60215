//! Typed coercion of raw operand text.
//!
//! All type-specific parsing (numbers, ISO dates, booleans, wildcard strings,
//! list values) happens here, keyed on the field's declared type.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

use super::ast::{Comparator, MembershipMode, Operand, Scalar, TextPattern};
use crate::field::FieldType;

/// Operand text that does not fit the field's declared type.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct OperandError(pub String);

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 date or datetime. Offsets are normalised to UTC.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn split_values(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Coerce `raw` (unquoted operand text) for a field of `field_type`.
pub fn parse_operand(field_type: FieldType, raw: &str) -> Result<Operand, OperandError> {
    let mut chars = raw.chars();
    let first = chars.next();
    let rest = chars.as_str();

    if let Some(comparator) = first.and_then(Comparator::from_char) {
        if rest.is_empty() {
            return Err(OperandError(format!(
                "is missing a value after '{}'",
                comparator.symbol()
            )));
        }
        let value = match field_type {
            FieldType::Int | FieldType::Float => parse_number(rest)
                .map(Scalar::Number)
                .ok_or_else(|| OperandError("cannot be converted into a number".to_string()))?,
            FieldType::DateTime => parse_datetime(rest)
                .map(Scalar::DateTime)
                .ok_or_else(|| OperandError("cannot be converted into a date".to_string()))?,
            other => {
                return Err(OperandError(format!(
                    "compares with '{}' but the field is a {} field, not a number or datetime",
                    comparator.symbol(),
                    other
                )))
            }
        };
        return Ok(Operand::Compare { comparator, value });
    }

    if let Some(marker @ ('?' | '!')) = first {
        if field_type != FieldType::List {
            return Err(OperandError(format!(
                "tests membership with '{}' but the field is a {} field, not a list",
                marker, field_type
            )));
        }
        let values = split_values(rest);
        if values.is_empty() {
            return Err(OperandError(format!("is missing values after '{}'", marker)));
        }
        let mode = if marker == '!' {
            MembershipMode::Exact
        } else {
            MembershipMode::Contains
        };
        return Ok(Operand::Members { mode, values });
    }

    match field_type {
        FieldType::String => {
            let pattern = TextPattern::from_wildcard(raw);
            if let TextPattern::Glob(_) = pattern {
                pattern
                    .compile()
                    .map_err(|e| OperandError(format!("is not a usable pattern: {}", e)))?;
            }
            Ok(Operand::Text(pattern))
        }
        FieldType::Bool => Ok(Operand::Flag(raw == "t" || raw == "T")),
        FieldType::List => {
            let values = split_values(raw);
            if values.is_empty() {
                return Err(OperandError("is not a list value".to_string()));
            }
            Ok(Operand::Members {
                mode: MembershipMode::Contains,
                values,
            })
        }
        other => Err(OperandError(format!(
            "needs a comparator ('>', '<' or '=') for a {} field",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_operands() {
        assert_eq!(
            parse_operand(FieldType::Int, ">2"),
            Ok(Operand::Compare {
                comparator: Comparator::GreaterThan,
                value: Scalar::Number(2.0)
            })
        );
        assert_eq!(
            parse_operand(FieldType::Float, "<0.5"),
            Ok(Operand::Compare {
                comparator: Comparator::LessThan,
                value: Scalar::Number(0.5)
            })
        );
        assert!(parse_operand(FieldType::Float, ">76.8.9").is_err());
        assert!(parse_operand(FieldType::Int, ">inf").is_err());
        assert!(parse_operand(FieldType::Int, "=").is_err());
        assert!(parse_operand(FieldType::Int, "4").is_err());
    }

    #[test]
    fn test_datetime_operands() {
        let expected = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_time(NaiveTime::MIN);
        assert_eq!(
            parse_operand(FieldType::DateTime, "<2000-01-01"),
            Ok(Operand::Compare {
                comparator: Comparator::LessThan,
                value: Scalar::DateTime(expected)
            })
        );
        let err = parse_operand(FieldType::DateTime, ">2020-14-99").unwrap_err();
        assert_eq!(err.0, "cannot be converted into a date");
        assert!(parse_operand(FieldType::DateTime, "sometime").is_err());
    }

    #[test]
    fn test_parse_datetime_forms() {
        assert!(parse_datetime("2010-03-15T10:30:00").is_some());
        assert!(parse_datetime("2010-03-15 10:30").is_some());
        assert_eq!(
            parse_datetime("2010-03-15T10:30:00+02:00"),
            parse_datetime("2010-03-15T08:30:00")
        );
        assert!(parse_datetime("15/03/2010").is_none());
    }

    #[test]
    fn test_string_and_bool_operands() {
        assert_eq!(
            parse_operand(FieldType::String, "*el*"),
            Ok(Operand::Text(TextPattern::Contains("el".into())))
        );
        assert_eq!(parse_operand(FieldType::Bool, "T"), Ok(Operand::Flag(true)));
        assert_eq!(parse_operand(FieldType::Bool, "f"), Ok(Operand::Flag(false)));
        assert_eq!(parse_operand(FieldType::Bool, "true"), Ok(Operand::Flag(false)));
        assert!(parse_operand(FieldType::String, ">5").is_err());
        assert!(parse_operand(FieldType::Bool, "=9").is_err());
    }

    #[test]
    fn test_oversized_glob_fails_at_parse_time() {
        assert_eq!(
            parse_operand(FieldType::String, "z*a"),
            Ok(Operand::Text(TextPattern::Glob("z*a".into())))
        );
        let huge = format!("{}z", "a*".repeat(100_000));
        let err = parse_operand(FieldType::String, &huge).unwrap_err();
        assert!(err.0.starts_with("is not a usable pattern"));
    }

    #[test]
    fn test_list_operands() {
        assert_eq!(
            parse_operand(FieldType::List, "?red,green"),
            Ok(Operand::Members {
                mode: MembershipMode::Contains,
                values: vec!["red".into(), "green".into()]
            })
        );
        assert_eq!(
            parse_operand(FieldType::List, "!red"),
            Ok(Operand::Members {
                mode: MembershipMode::Exact,
                values: vec!["red".into()]
            })
        );
        assert_eq!(
            parse_operand(FieldType::List, "red"),
            Ok(Operand::Members {
                mode: MembershipMode::Contains,
                values: vec!["red".into()]
            })
        );
        assert!(parse_operand(FieldType::List, "?").is_err());
        assert!(parse_operand(FieldType::String, "?red").is_err());
    }
}
