//! Conversion between `M:SS` / `H:MM:SS` labels and second counts.

/// Parse a timestamp label into seconds.
///
/// The leading component may have any number of digits; every following
/// component must be exactly two digits below 60. Returns `None` for anything
/// else.
pub fn parse_timestamp(input: &str) -> Option<u32> {
    let parts: Vec<&str> = input.trim().split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }

    let (lead, rest) = parts.split_first()?;
    if lead.is_empty() || !lead.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut total: u32 = lead.parse().ok()?;

    for part in rest {
        if part.len() != 2 || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let value: u32 = part.parse().ok()?;
        if value >= 60 {
            return None;
        }
        total = total.checked_mul(60)?.checked_add(value)?;
    }

    Some(total)
}

pub fn format_timestamp(seconds: u32) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Canonical form of a label, e.g. `"00:07"` becomes `"0:07"`.
pub fn normalize_timestamp(input: &str) -> Option<String> {
    parse_timestamp(input).map(format_timestamp)
}

/// Seconds from a backend-supplied float position, clamped at zero.
pub fn seconds_from_f64(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hours_minutes_seconds() {
        assert_eq!(parse_timestamp("1:02:05"), Some(3725));
        assert_eq!(parse_timestamp("00:00:59"), Some(59));
    }

    #[test]
    fn parses_minutes_seconds() {
        assert_eq!(parse_timestamp("2:15"), Some(135));
        assert_eq!(parse_timestamp("02:15"), Some(135));
        assert_eq!(parse_timestamp(" 45:00 "), Some(2700));
        assert_eq!(parse_timestamp("120:00"), Some(7200));
    }

    #[test]
    fn formats_with_and_without_hours() {
        assert_eq!(format_timestamp(3725), "1:02:05");
        assert_eq!(format_timestamp(135), "2:15");
        assert_eq!(format_timestamp(0), "0:00");
        assert_eq!(format_timestamp(36_000), "10:00:00");
    }

    #[test]
    fn malformed_input_is_none() {
        for bad in [
            "", ":", "1", "1:", ":15", "1:5", "1:60", "1:75:00", "1:00:60", "a:bc", "1:2:3:4",
            "-1:00", "1:0x",
        ] {
            assert_eq!(parse_timestamp(bad), None, "{bad:?} should not parse");
        }
    }

    #[test]
    fn round_trip_matches_normalized_form() {
        for label in ["0:07", "00:07", "9:59", "59:59", "1:00:00", "01:02:05", "12:34:56"] {
            let seconds = parse_timestamp(label).expect("valid label");
            assert_eq!(
                Some(format_timestamp(seconds)),
                normalize_timestamp(label),
                "{label}"
            );
            assert_eq!(parse_timestamp(&format_timestamp(seconds)), Some(seconds));
        }
        assert_eq!(normalize_timestamp("00:07").as_deref(), Some("0:07"));
        assert_eq!(normalize_timestamp("75:00").as_deref(), Some("1:15:00"));
    }

    #[test]
    fn float_positions_round_and_clamp() {
        assert_eq!(seconds_from_f64(134.6), 135);
        assert_eq!(seconds_from_f64(-3.0), 0);
        assert_eq!(seconds_from_f64(f64::NAN), 0);
    }
}
