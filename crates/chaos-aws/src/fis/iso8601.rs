//! ISO-8601 duration strings as used by FIS action parameters (`PT5M`, `PT1M30S`).
//!
//! Only calendar-independent designators are accepted: weeks and days in the
//! date part, hours, minutes and seconds in the time part. Years and months
//! have no fixed length and are rejected.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("empty duration")]
    Empty,
    #[error("duration must start with 'P'")]
    MissingPrefix,
    #[error("duration has no components")]
    NoComponents,
    #[error("unsupported designator '{0}'")]
    Unsupported(char),
    #[error("designator '{0}' out of order or repeated")]
    OutOfOrder(char),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("number without designator at end of input")]
    Dangling,
    #[error("duration out of range")]
    Overflow,
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

pub fn parse_iso8601_duration(input: &str) -> Result<Duration, DurationParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DurationParseError::Empty);
    }
    let rest = input
        .strip_prefix('P')
        .or_else(|| input.strip_prefix('p'))
        .ok_or(DurationParseError::MissingPrefix)?;

    let mut total_nanos: u128 = 0;
    let mut in_time = false;
    let mut last_rank = 0u8;
    let mut components = 0;
    let mut number = String::new();

    for c in rest.chars() {
        let c = c.to_ascii_uppercase();
        if c.is_ascii_digit() || c == '.' || c == ',' {
            number.push(if c == ',' { '.' } else { c });
            continue;
        }
        if c == 'T' {
            if in_time || !number.is_empty() {
                return Err(DurationParseError::OutOfOrder('T'));
            }
            in_time = true;
            continue;
        }

        let (rank, unit_secs) = match (in_time, c) {
            (false, 'W') => (1, 7 * 86_400),
            (false, 'D') => (2, 86_400),
            (true, 'H') => (3, 3_600),
            (true, 'M') => (4, 60),
            (true, 'S') => (5, 1),
            _ => return Err(DurationParseError::Unsupported(c)),
        };
        if rank <= last_rank {
            return Err(DurationParseError::OutOfOrder(c));
        }
        last_rank = rank;

        total_nanos = total_nanos
            .checked_add(component_nanos(&number, unit_secs)?)
            .ok_or(DurationParseError::Overflow)?;
        number.clear();
        components += 1;
    }

    if !number.is_empty() {
        return Err(DurationParseError::Dangling);
    }
    if components == 0 {
        return Err(DurationParseError::NoComponents);
    }

    let secs =
        u64::try_from(total_nanos / NANOS_PER_SEC).map_err(|_| DurationParseError::Overflow)?;
    // Always below one second's worth of nanos.
    let nanos = (total_nanos % NANOS_PER_SEC) as u32;
    Ok(Duration::new(secs, nanos))
}

/// Exact value of `number` units of `unit_secs` seconds, in nanoseconds.
fn component_nanos(number: &str, unit_secs: u128) -> Result<u128, DurationParseError> {
    let invalid = || DurationParseError::InvalidNumber(number.to_string());

    let (whole, fraction) = match number.split_once('.') {
        Some((w, f)) => (w, f),
        None => (number, ""),
    };
    if whole.is_empty() || fraction.contains('.') {
        return Err(invalid());
    }
    let whole: u128 = whole.parse().map_err(|_| invalid())?;

    // Keep nanosecond precision; further digits are truncated.
    let mut frac_nanos: u128 = 0;
    let mut scale = NANOS_PER_SEC;
    for digit in fraction.chars().take(9) {
        let d = digit.to_digit(10).ok_or_else(invalid)? as u128;
        scale /= 10;
        frac_nanos += d * scale;
    }

    whole
        .checked_mul(unit_secs * NANOS_PER_SEC)
        .and_then(|nanos| nanos.checked_add(frac_nanos * unit_secs))
        .ok_or(DurationParseError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_fis_durations() {
        assert_eq!(parse_iso8601_duration("PT5M"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_iso8601_duration("PT1M30S"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_iso8601_duration("PT1H"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_iso8601_duration("P1DT2H"), Ok(Duration::from_secs(93_600)));
        assert_eq!(parse_iso8601_duration("P1W"), Ok(Duration::from_secs(604_800)));
    }

    #[test]
    fn keeps_fractions_exact() {
        assert_eq!(parse_iso8601_duration("PT0.5S"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_iso8601_duration("PT1,25S"), Ok(Duration::from_millis(1250)));
        assert_eq!(parse_iso8601_duration("PT0.5M"), Ok(Duration::from_secs(30)));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_iso8601_duration(""), Err(DurationParseError::Empty));
        assert_eq!(
            parse_iso8601_duration("not-a-duration"),
            Err(DurationParseError::MissingPrefix)
        );
        assert_eq!(parse_iso8601_duration("P"), Err(DurationParseError::NoComponents));
        assert_eq!(parse_iso8601_duration("PT"), Err(DurationParseError::NoComponents));
        assert_eq!(parse_iso8601_duration("PT5"), Err(DurationParseError::Dangling));
        assert_eq!(parse_iso8601_duration("P1M"), Err(DurationParseError::Unsupported('M')));
        assert_eq!(parse_iso8601_duration("PT1S1M"), Err(DurationParseError::OutOfOrder('M')));
        assert_eq!(parse_iso8601_duration("P5H"), Err(DurationParseError::Unsupported('H')));
        assert!(matches!(
            parse_iso8601_duration("PT1.2.3S"),
            Err(DurationParseError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_iso8601_duration("PTS"),
            Err(DurationParseError::InvalidNumber(_))
        ));
    }

    #[test]
    fn out_of_range_values_are_errors() {
        assert_eq!(
            parse_iso8601_duration("P99999999999999999999999999999999999W"),
            Err(DurationParseError::Overflow)
        );
        assert_eq!(
            parse_iso8601_duration("PT99999999999999999999999999S"),
            Err(DurationParseError::Overflow)
        );
        assert_eq!(
            parse_iso8601_duration("PT18446744073709551615S"),
            Ok(Duration::from_secs(u64::MAX))
        );
    }
}
