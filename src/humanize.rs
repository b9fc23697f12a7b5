//! Approximate, human friendly rendering of durations.

use chrono::Duration;

/// Renders a duration as a short natural-language phrase.
///
/// Only the magnitude is rendered; callers phrase the direction ("in ...",
/// "... ago").
pub trait Humanize {
    fn humanize(&self, duration: Duration) -> String;
}

/// The classic "distance of time in words" scale: "less than a minute",
/// "about 1 hour", "5 days", "about 1 month", "over 2 years", ...
#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceOfTime;

const MINUTES_PER_DAY: i64 = 1_440;
const MINUTES_PER_MONTH: i64 = 43_200;
const MINUTES_PER_YEAR: i64 = 525_600;

impl Humanize for DistanceOfTime {
    fn humanize(&self, duration: Duration) -> String {
        let seconds = duration.num_seconds().abs();
        // round half up
        let minutes = (seconds + 30) / 60;

        match minutes {
            0 => "less than a minute".to_owned(),
            1 => "1 minute".to_owned(),
            2..=44 => format!("{minutes} minutes"),
            45..=89 => "about 1 hour".to_owned(),
            90..=1_439 => format!("about {} hours", rounded(minutes, 60)),
            1_440..=2_519 => "1 day".to_owned(),
            2_520..=43_199 => format!("{} days", rounded(minutes, MINUTES_PER_DAY)),
            43_200..=86_399 => {
                plural("about", rounded(minutes, MINUTES_PER_MONTH), "month")
            }
            86_400..=525_599 => format!("{} months", rounded(minutes, MINUTES_PER_MONTH)),
            _ => years(minutes),
        }
    }
}

fn years(minutes: i64) -> String {
    // One leap day every four years.
    let leap_days = minutes / MINUTES_PER_YEAR / 4;
    let minutes = minutes - leap_days * MINUTES_PER_DAY;
    let years = minutes / MINUTES_PER_YEAR;
    let remainder = minutes % MINUTES_PER_YEAR;

    if remainder < 131_400 {
        plural("about", years, "year")
    } else if remainder < 394_200 {
        plural("over", years, "year")
    } else {
        plural("almost", years + 1, "year")
    }
}

fn rounded(value: i64, unit: i64) -> i64 {
    (value + unit / 2) / unit
}

fn plural(qualifier: &str, count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{qualifier} 1 {unit}")
    } else {
        format!("{qualifier} {count} {unit}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(duration: Duration) -> String {
        DistanceOfTime.humanize(duration)
    }

    #[test]
    fn test_minutes_and_hours() {
        assert_eq!(words(Duration::seconds(10)), "less than a minute");
        assert_eq!(words(Duration::seconds(70)), "1 minute");
        assert_eq!(words(Duration::minutes(30)), "30 minutes");
        assert_eq!(words(Duration::hours(1)), "about 1 hour");
        assert_eq!(words(Duration::hours(12)), "about 12 hours");
        assert_eq!(words(Duration::minutes(100)), "about 2 hours");
    }

    #[test]
    fn test_days_and_months() {
        assert_eq!(words(Duration::hours(30)), "1 day");
        assert_eq!(words(Duration::days(5)), "5 days");
        assert_eq!(words(Duration::days(29)), "29 days");
        assert_eq!(words(Duration::days(30)), "about 1 month");
        assert_eq!(words(Duration::days(50)), "about 2 months");
        assert_eq!(words(Duration::days(90)), "3 months");
    }

    #[test]
    fn test_years() {
        assert_eq!(words(Duration::days(365)), "about 1 year");
        assert_eq!(words(Duration::days(365 + 150)), "over 1 year");
        assert_eq!(words(Duration::days(365 + 300)), "almost 2 years");
        assert_eq!(words(Duration::days(4 * 365 + 1)), "about 4 years");
    }

    #[test]
    fn test_sign_is_ignored() {
        assert_eq!(words(Duration::hours(-1)), "about 1 hour");
        assert_eq!(words(Duration::days(-5)), words(Duration::days(5)));
    }
}
