use crate::catalog::models::DurationRange;

/// Human-readable duration label with the site's fixed thresholds, applied
/// to the upper bound of the range:
/// - >= 1440 minutes: "N Day(s)"
/// - >= 360 minutes: "Full Day"
/// - >= 240 minutes: "Half Day"
/// - otherwise hours/minutes, as a range when `from != to`
pub fn format_duration(from_minutes: u32, to_minutes: u32) -> String {
    let to = to_minutes.max(from_minutes);
    if to >= 1440 {
        let days = to.div_ceil(1440);
        return if days == 1 {
            "1 Day".to_string()
        } else {
            format!("{days} Days")
        };
    }
    if to >= 360 {
        return "Full Day".to_string();
    }
    if to >= 240 {
        return "Half Day".to_string();
    }
    if from_minutes == to {
        return format_minutes(to);
    }
    format!("{} - {}", format_minutes(from_minutes), format_minutes(to))
}

pub fn format_range(range: &DurationRange) -> String {
    format_duration(range.from_minutes, range.to_minutes)
}

fn format_minutes(minutes: u32) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    match (hours, rest) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_short_durations_have_no_range_dash() {
        assert_eq!(format_duration(90, 90), "1h 30m");
        assert_eq!(format_duration(120, 120), "2h");
        assert_eq!(format_duration(45, 45), "45m");
        for minutes in [1u32, 59, 60, 61, 120, 150, 239] {
            let label = format_duration(minutes, minutes);
            assert!(!label.contains('-'), "unexpected dash in {label:?}");
        }
    }

    #[test]
    fn short_ranges_render_both_bounds() {
        assert_eq!(format_duration(60, 120), "1h - 2h");
        assert_eq!(format_duration(90, 150), "1h 30m - 2h 30m");
    }

    #[test]
    fn half_and_full_day_thresholds() {
        assert_eq!(format_duration(240, 240), "Half Day");
        assert_eq!(format_duration(180, 300), "Half Day");
        assert_eq!(format_duration(360, 360), "Full Day");
        assert_eq!(format_duration(240, 480), "Full Day");
        assert_eq!(format_duration(239, 239), "3h 59m");
    }

    #[test]
    fn day_counts_use_ceiling_of_upper_bound() {
        assert_eq!(format_duration(1440, 1440), "1 Day");
        assert_eq!(format_duration(1440, 1441), "2 Days");
        assert_eq!(format_duration(1440, 2880), "2 Days");
        assert_eq!(format_duration(600, 4320), "3 Days");
    }

    #[test]
    fn inverted_ranges_are_normalized() {
        assert_eq!(format_duration(120, 60), "2h");
    }
}
