// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Display formatting for raw record values.
//!
//! Every function here is total: a value that cannot be formatted for its
//! declared type degrades to its plain text form instead of failing.

use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

const MAX_FRACTION_DIGITS: usize = 3;

pub fn format_value(value: &Value, declared_type: &str) -> String {
    if value.is_null() {
        return String::new();
    }

    let normalized = declared_type.to_ascii_lowercase();
    if normalized.contains("date") || normalized.contains("timestamp") {
        return format_date_time(value);
    }
    if normalized.contains("int") || normalized == "number" {
        return format_number(value);
    }
    if ["decimal", "float", "double", "money"]
        .iter()
        .any(|marker| normalized.contains(marker))
    {
        return format_number(value);
    }
    if normalized == "boolean" || normalized == "bool" {
        return format_boolean(value);
    }
    if normalized.contains("json") || normalized == "object" {
        return format_json(value);
    }
    plain_text(value)
}

/// String form of a value with no type-specific treatment.
pub fn plain_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Strings are parsed as dates; numbers are epoch milliseconds.
pub fn format_date_time(value: &Value) -> String {
    let parsed = match value {
        Value::String(raw) => parse_date_time(raw),
        Value::Number(number) => number.as_i64().and_then(epoch_millis),
        _ => None,
    };
    let Some(parsed) = parsed else {
        return plain_text(value);
    };
    parsed
        .format(format_description!(
            "[month padding:none]/[day padding:none]/[year], [hour repr:12 padding:none]:[minute]:[second] [period]"
        ))
        .unwrap_or_else(|_| plain_text(value))
}

fn epoch_millis(millis: i64) -> Option<PrimitiveDateTime> {
    let utc = OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()?;
    Some(PrimitiveDateTime::new(utc.date(), utc.time()))
}

pub fn parse_date_time(raw: &str) -> Option<PrimitiveDateTime> {
    let trimmed = raw.trim();
    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        let utc = parsed.to_offset(UtcOffset::UTC);
        return Some(PrimitiveDateTime::new(utc.date(), utc.time()));
    }

    let spaced = trimmed.replacen('T', " ", 1);
    let whole_seconds = match spaced.split_once('.') {
        Some((head, _)) => head,
        None => spaced.as_str(),
    };
    if let Ok(parsed) = PrimitiveDateTime::parse(
        whole_seconds,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Some(parsed);
    }

    parse_date(trimmed).map(Date::midnight)
}

pub fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

pub fn format_number(value: &Value) -> String {
    match value {
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                format_integer(integer)
            } else if let Some(unsigned) = number.as_u64() {
                group_digits(&unsigned.to_string())
            } else {
                number
                    .as_f64()
                    .and_then(format_float)
                    .unwrap_or_else(|| number.to_string())
            }
        }
        Value::String(raw) => {
            let trimmed = raw.trim();
            if let Ok(integer) = trimmed.parse::<i64>() {
                return format_integer(integer);
            }
            if let Ok(unsigned) = trimmed.parse::<u64>() {
                return group_digits(&unsigned.to_string());
            }
            match trimmed.parse::<f64>() {
                Ok(parsed) => format_float(parsed).unwrap_or_else(|| raw.clone()),
                Err(_) => raw.clone(),
            }
        }
        other => plain_text(other),
    }
}

pub fn format_integer(value: i64) -> String {
    let grouped = group_digits(&value.unsigned_abs().to_string());
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

pub fn format_count(value: u64) -> String {
    group_digits(&value.to_string())
}

fn format_float(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }

    let fixed = format!("{:.*}", MAX_FRACTION_DIGITS, value.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');
    let is_zero = whole.chars().all(|ch| ch == '0') && fraction.is_empty();

    let mut out = String::new();
    if value.is_sign_negative() && !is_zero {
        out.push('-');
    }
    out.push_str(&group_digits(whole));
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(fraction);
    }
    Some(out)
}

fn group_digits(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_boolean(value: &Value) -> String {
    match value {
        Value::Bool(flag) => yes_no(*flag).to_owned(),
        Value::String(raw) => match parse_boolean_text(raw) {
            Some(flag) => yes_no(flag).to_owned(),
            None => raw.clone(),
        },
        Value::Number(number) => {
            let nonzero = number.as_f64().is_some_and(|parsed| parsed != 0.0);
            yes_no(nonzero).to_owned()
        }
        other => plain_text(other),
    }
}

pub fn parse_boolean_text(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "y" => Some(true),
        "false" | "no" | "0" | "n" => Some(false),
        _ => None,
    }
}

const fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

pub fn format_json(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| plain_text(value))
        }
        other => plain_text(other),
    }
}

#[cfg(test)]
mod tests {
    use super::{format_count, format_value, parse_date_time};
    use crate::NUMERIC_TYPES;
    use serde_json::{Value, json};

    #[test]
    fn null_formats_to_empty_for_every_type() {
        for declared in [
            "string", "integer", "date", "timestamp", "boolean", "json", "object", "money", "",
        ] {
            assert_eq!(format_value(&Value::Null, declared), "", "type {declared}");
        }
    }

    #[test]
    fn numeric_strings_match_their_parsed_numbers() {
        let samples = [
            ("1234.5", json!(1234.5)),
            ("42", json!(42)),
            ("-9876543", json!(-9876543)),
            ("0.1234", json!(0.1234)),
            ("1000000.25", json!(1000000.25)),
            ("18446744073709551615", json!(18446744073709551615u64)),
        ];
        for declared in NUMERIC_TYPES.iter().chain(["money", "int4"].iter()) {
            for (text, number) in &samples {
                assert_eq!(
                    format_value(&json!(text), declared),
                    format_value(number, declared),
                    "type {declared} sample {text}"
                );
            }
        }
    }

    #[test]
    fn numbers_are_grouped_with_three_fraction_digits_max() {
        assert_eq!(format_value(&json!(1234567), "integer"), "1,234,567");
        assert_eq!(format_value(&json!(1234.5678), "decimal"), "1,234.568");
        assert_eq!(format_value(&json!(-0.0001), "float"), "0");
        assert_eq!(format_value(&json!(-1500.5), "money"), "-1,500.5");
        assert_eq!(format_value(&json!(999), "bigint"), "999");
    }

    #[test]
    fn non_numeric_strings_pass_through_number_types() {
        assert_eq!(format_value(&json!("n/a"), "integer"), "n/a");
        assert_eq!(format_value(&json!(""), "number"), "");
        assert_eq!(format_value(&json!("inf"), "float"), "inf");
    }

    #[test]
    fn boolean_formatting_is_permissive() {
        assert_eq!(format_value(&json!(3), "boolean"), "Yes");
        assert_eq!(format_value(&json!(0), "bool"), "No");
        assert_eq!(format_value(&json!(true), "boolean"), "Yes");
        assert_eq!(format_value(&json!("no"), "boolean"), "No");
        assert_eq!(format_value(&json!("Y"), "boolean"), "Yes");
        assert_eq!(format_value(&json!("maybe"), "boolean"), "maybe");
    }

    #[test]
    fn dates_render_en_us_date_time() {
        assert_eq!(
            format_value(&json!("2024-01-15T14:05:09Z"), "timestamp"),
            "1/15/2024, 2:05:09 PM"
        );
        assert_eq!(
            format_value(&json!("2024-03-02T00:30:00+02:00"), "timestamptz"),
            "3/1/2024, 10:30:00 PM"
        );
        assert_eq!(
            format_value(&json!("2024-07-04"), "date"),
            "7/4/2024, 12:00:00 AM"
        );
        assert_eq!(
            format_value(&json!("2024-07-04 09:15:00.123"), "datetime"),
            "7/4/2024, 9:15:00 AM"
        );
    }

    #[test]
    fn numeric_dates_are_epoch_milliseconds() {
        assert_eq!(
            format_value(&json!(1705327509000i64), "timestamp"),
            "1/15/2024, 2:05:09 PM"
        );
        assert_eq!(
            format_value(&json!(1700000000), "date"),
            "1/20/1970, 4:13:20 PM"
        );
    }

    #[test]
    fn invalid_dates_fall_back_to_text() {
        assert_eq!(format_value(&json!("yesterday"), "date"), "yesterday");
        assert_eq!(format_value(&json!("2024-13-40"), "date"), "2024-13-40");
        assert_eq!(format_value(&json!(true), "timestamp"), "true");
        assert_eq!(format_value(&json!(1.5e300), "date"), "1.5e300");
        assert!(parse_date_time("not a date").is_none());
    }

    #[test]
    fn json_types_pretty_print_structures() {
        assert_eq!(
            format_value(&json!({"a": 1}), "jsonb"),
            "{\n  \"a\": 1\n}"
        );
        assert_eq!(format_value(&json!([1, 2]), "object"), "[\n  1,\n  2\n]");
        assert_eq!(format_value(&json!("raw"), "json"), "raw");
    }

    #[test]
    fn unknown_types_use_plain_text() {
        assert_eq!(format_value(&json!("hello"), "varchar"), "hello");
        assert_eq!(format_value(&json!(12), "uuid"), "12");
        assert_eq!(format_value(&json!(false), "text"), "false");
        assert_eq!(format_value(&json!({"k": "v"}), "text"), r#"{"k":"v"}"#);
    }

    #[test]
    fn counts_are_grouped() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(12345678), "12,345,678");
    }
}
