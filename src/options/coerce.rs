//! Tolerant coercion of raw option values.
//!
//! Option maps come from textual configuration sources, so conversions here
//! never fail hard: malformed input degrades to the type's zero value and is
//! surfaced through a `tracing` warning plus a metrics counter. Duration
//! values accept unit sequences (`300ms`, `2h45m`, `1.5h`) as well as bare
//! numbers, which are read as nanoseconds; negative values are legal and are
//! interpreted as sentinels by the resolution layer.

use crate::metrics;

/// Nanoseconds per unit suffix. Longer suffixes first so `ms` wins over `m`
/// and `ns`/`us` win over `s`.
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("us", 1e3),
    ("µs", 1e3),
    ("μs", 1e3),
    ("ms", 1e6),
    ("s", 1e9),
    ("m", 6e10),
    ("h", 3.6e12),
];

fn warn(key: &str, raw: &str, wanted: &str) {
    tracing::warn!(key, value = raw, "config value is not a valid {wanted}, using zero value");
    metrics::counters::translation_warning(key);
}

/// Coerce to an integer. Malformed input yields 0.
pub(crate) fn to_i64(key: &str, raw: &str) -> i64 {
    let s = trim_zero_decimal(raw.trim());
    if s.is_empty() {
        return 0;
    }
    match s.parse::<i64>() {
        Ok(v) => v,
        Err(_) => {
            warn(key, raw, "integer");
            0
        }
    }
}

/// Coerce to a boolean. Accepts `1/t/T/TRUE/true/True` and the matching
/// false spellings; anything else yields false.
pub(crate) fn to_bool(key: &str, raw: &str) -> bool {
    match raw.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => true,
        "" | "0" | "f" | "F" | "false" | "FALSE" | "False" => false,
        _ => {
            warn(key, raw, "boolean");
            false
        }
    }
}

/// Coerce to a signed duration in nanoseconds. Malformed input yields 0.
pub(crate) fn to_duration_nanos(key: &str, raw: &str) -> i64 {
    match parse_duration_nanos(raw.trim()) {
        Some(v) => v,
        None => {
            warn(key, raw, "duration");
            0
        }
    }
}

/// Strip a trailing `.0…` so values like `"3.000"` read as integers.
fn trim_zero_decimal(s: &str) -> &str {
    match s.split_once('.') {
        Some((head, frac)) if !frac.is_empty() && frac.bytes().all(|b| b == b'0') => head,
        _ => s,
    }
}

fn parse_duration_nanos(s: &str) -> Option<i64> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if body.is_empty() {
        return None;
    }

    // Bare number: nanoseconds.
    if body.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        let value = body.parse::<f64>().ok()?;
        return finish(negative, value);
    }

    // Sequence of <number><unit> segments.
    let mut rest = body;
    let mut total = 0.0_f64;
    while !rest.is_empty() {
        let split = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if split == 0 {
            return None;
        }
        let value = rest[..split].parse::<f64>().ok()?;
        rest = &rest[split..];

        let (scale, suffix_len) = UNITS
            .iter()
            .find_map(|(suffix, scale)| rest.starts_with(suffix).then_some((*scale, suffix.len())))?;
        total += value * scale;
        rest = &rest[suffix_len..];
    }
    finish(negative, total)
}

fn finish(negative: bool, nanos: f64) -> Option<i64> {
    if !nanos.is_finite() {
        return None;
    }
    let v = nanos as i64;
    Some(if negative { -v } else { v })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_i64_plain() {
        assert_eq!(to_i64("db", "2"), 2);
        assert_eq!(to_i64("db", " -7 "), -7);
        assert_eq!(to_i64("db", "3.000"), 3);
    }

    #[test]
    fn test_to_i64_malformed_degrades_to_zero() {
        assert_eq!(to_i64("maxRetries", "lots"), 0);
        assert_eq!(to_i64("maxRetries", "1.5"), 0);
        assert_eq!(to_i64("maxRetries", ""), 0);
    }

    #[test]
    fn test_to_bool_spellings() {
        for raw in ["1", "t", "T", "true", "TRUE", "True"] {
            assert!(to_bool("poolFIFO", raw), "{raw}");
        }
        for raw in ["", "0", "f", "F", "false", "FALSE", "False"] {
            assert!(!to_bool("poolFIFO", raw), "{raw:?}");
        }
    }

    #[test]
    fn test_to_bool_malformed_is_false() {
        assert!(!to_bool("readOnly", "yes"));
        assert!(!to_bool("readOnly", "on"));
    }

    #[test]
    fn test_duration_units() {
        assert_eq!(to_duration_nanos("t", "10s"), 10_000_000_000);
        assert_eq!(to_duration_nanos("t", "300ms"), 300_000_000);
        assert_eq!(to_duration_nanos("t", "2h45m"), (2 * 3600 + 45 * 60) * 1_000_000_000);
        assert_eq!(to_duration_nanos("t", "1.5h"), 5_400_000_000_000);
        assert_eq!(to_duration_nanos("t", "8ms"), 8_000_000);
        assert_eq!(to_duration_nanos("t", "250us"), 250_000);
    }

    #[test]
    fn test_duration_bare_number_is_nanoseconds() {
        assert_eq!(to_duration_nanos("t", "100"), 100);
        assert_eq!(to_duration_nanos("t", "0"), 0);
    }

    #[test]
    fn test_duration_negative_sentinels() {
        assert_eq!(to_duration_nanos("t", "-1"), -1);
        assert_eq!(to_duration_nanos("t", "-2"), -2);
        assert_eq!(to_duration_nanos("t", "-1s"), -1_000_000_000);
    }

    #[test]
    fn test_duration_malformed_degrades_to_zero() {
        assert_eq!(to_duration_nanos("t", "soon"), 0);
        assert_eq!(to_duration_nanos("t", "10 s"), 0);
        assert_eq!(to_duration_nanos("t", "s10"), 0);
        assert_eq!(to_duration_nanos("t", "-"), 0);
    }
}
