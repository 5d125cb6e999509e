//! Human readable renderings
//!
//! Display helpers only. Nothing produced here is ever compared.

use chrono::{DateTime, Utc};

const ENGINEERING_SUFFIXES: [&str; 4] = ["k", "m", "g", "t"];

/// Render a counter in engineering notation (`950`, `1.2k`, `12.3k`, `123m`).
///
/// Mantissas below 10 keep two significant digits, mantissas of 10 and above
/// gain one more.
pub fn int_to_hrf(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let mut mantissa = value.unsigned_abs() as f64;
    if mantissa < 1000.0 {
        return value.to_string();
    }

    let mut suffix_index = 0;
    mantissa /= 1000.0;
    loop {
        let rounded = round_for_display(mantissa);
        if rounded < 1000.0 || suffix_index + 1 == ENGINEERING_SUFFIXES.len() {
            mantissa = rounded;
            break;
        }
        mantissa /= 1000.0;
        suffix_index += 1;
    }

    let suffix = ENGINEERING_SUFFIXES[suffix_index];
    if mantissa >= 100.0 {
        format!("{}{:.0}{}", sign, mantissa, suffix)
    } else {
        format!("{}{:.1}{}", sign, mantissa, suffix)
    }
}

fn round_for_display(mantissa: f64) -> f64 {
    if mantissa >= 100.0 {
        mantissa.round()
    } else {
        (mantissa * 10.0).round() / 10.0
    }
}

/// Render a unix timestamp the way changed records carry it
pub fn timestamp_to_hrf(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Convert optical power in microwatts to dBm
pub fn uw_to_dbm(microwatts: f64) -> Option<f64> {
    if microwatts > 0.0 {
        Some(round2(10.0 * (microwatts / 1000.0).log10()))
    } else {
        None
    }
}

/// Round to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_to_hrf_small_values_unchanged() {
        assert_eq!(int_to_hrf(0), "0");
        assert_eq!(int_to_hrf(999), "999");
        assert_eq!(int_to_hrf(-42), "-42");
    }

    #[test]
    fn test_int_to_hrf_adaptive_precision() {
        assert_eq!(int_to_hrf(1_234), "1.2k");
        assert_eq!(int_to_hrf(12_345), "12.3k");
        assert_eq!(int_to_hrf(123_456), "123k");
        assert_eq!(int_to_hrf(4_500_000), "4.5m");
        assert_eq!(int_to_hrf(7_100_000_000), "7.1g");
    }

    #[test]
    fn test_int_to_hrf_carries_into_next_suffix() {
        assert_eq!(int_to_hrf(999_999), "1.0m");
    }

    #[test]
    fn test_timestamp_to_hrf() {
        assert_eq!(
            timestamp_to_hrf(1_700_000_000).as_deref(),
            Some("2023-11-14 22:13:20")
        );
    }

    #[test]
    fn test_uw_to_dbm() {
        assert_eq!(uw_to_dbm(1000.0), Some(0.0));
        assert_eq!(uw_to_dbm(100.0), Some(-10.0));
        assert_eq!(uw_to_dbm(0.0), None);
    }
}
