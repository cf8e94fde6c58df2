//! Parsing of Vault-style duration strings ("768h", "5000ms", "3.5h")

use std::time::Duration;

use crate::SecretsError;

const NANOS: f64 = 1e-9;
const MICROS: f64 = 1e-6;
const MILLIS: f64 = 1e-3;
const MINUTE: f64 = 60.0;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;

fn unit_seconds(unit: &str) -> Option<f64> {
    match unit.to_lowercase().as_str() {
        "ns" => Some(NANOS),
        "us" | "\u{b5}s" | "\u{3bc}s" => Some(MICROS),
        "ms" => Some(MILLIS),
        "s" => Some(1.0),
        "m" => Some(MINUTE),
        "h" => Some(HOUR),
        "d" => Some(DAY),
        _ => None,
    }
}

/// Convert a duration string to seconds.
///
/// Valid units are "ns", "us" (or "µs"), "ms", "s", "m", "h", "d"; components
/// may be chained ("1h30m"). A bare number is seconds. Empty input and
/// negative values yield 0. Commas are ignored.
pub fn parse_seconds(input: &str) -> Result<f64, SecretsError> {
    let input = input.trim();
    if input.is_empty() || input.starts_with('-') {
        return Ok(0.0);
    }

    if let Ok(seconds) = input.parse::<f64>() {
        if seconds.is_finite() {
            return Ok(seconds);
        }
    }

    let cleaned: String = input.chars().filter(|c| *c != ',').collect();
    let mut chars = cleaned.chars().peekable();
    let mut total = 0.0;

    while chars.peek().is_some() {
        let mut number = String::new();
        while let Some(c) = chars.peek().copied().filter(|c| c.is_ascii_digit() || *c == '.') {
            number.push(c);
            chars.next();
        }

        let mut unit = String::new();
        while let Some(c) = chars.peek().copied().filter(|c| c.is_alphabetic()) {
            unit.push(c);
            chars.next();
        }

        if number.is_empty() || unit.is_empty() {
            return Err(SecretsError::InvalidConfig(format!(
                "invalid duration '{input}'"
            )));
        }

        let value: f64 = number.parse().map_err(|_| {
            SecretsError::InvalidConfig(format!("invalid number '{number}' in duration '{input}'"))
        })?;
        let modifier = unit_seconds(&unit)
            .ok_or_else(|| SecretsError::InvalidConfig(format!("Unknown unit {unit}")))?;

        total += value * modifier;
    }

    Ok(total)
}

/// Same as [`parse_seconds`], as a `Duration`
pub fn parse_duration(input: &str) -> Result<Duration, SecretsError> {
    Duration::try_from_secs_f64(parse_seconds(input)?)
        .map_err(|_| SecretsError::InvalidConfig(format!("duration '{input}' out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(input: &str, expected: f64) {
        let parsed = parse_seconds(input).unwrap();
        assert!(
            (parsed - expected).abs() < 1e-9,
            "{input}: expected {expected}, got {parsed}"
        );
    }

    #[test]
    fn test_bare_number_is_seconds() {
        approx("10", 10.0);
    }

    #[test]
    fn test_units() {
        approx("5000000000ns", 5.0);
        approx("5000000µs", 5.0);
        approx("5000000us", 5.0);
        approx("5000ms", 5.0);
        approx("50s", 50.0);
        approx("3m", 180.0);
        approx("768h", 2_764_800.0);
        approx("3d", 259_200.0);
    }

    #[test]
    fn test_empty_and_negative_are_zero() {
        approx("", 0.0);
        approx("-5s", 0.0);
    }

    #[test]
    fn test_commas_are_ignored() {
        approx("5,000,000µs", 5.0);
    }

    #[test]
    fn test_fractional_and_chained() {
        approx("3.5h", 12_600.0);
        approx("1h30m", 5_400.0);
    }

    #[test]
    fn test_unknown_unit() {
        let err = parse_seconds("20foo").unwrap_err();
        assert_eq!(err.to_string(), "Invalid configuration: Unknown unit foo");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    }
}
