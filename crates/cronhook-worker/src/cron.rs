//! Cron expression matching against a single instant.
//!
//! Field parsing is delegated to the `cron` crate. That crate numbers
//! weekdays 1-7 starting on Sunday, so the day-of-week field is rewritten
//! from the usual 0-7 convention (0 and 7 both Sunday) before parsing.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Timelike, Utc};
use cron::{Schedule, TimeUnitSpec};

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Finest field a match takes into account.
///
/// Fields finer than the granularity are ignored, so `Hour` accepts any
/// minute of a matching hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Granularity {
    /// Check every field.
    #[default]
    Minute,
    /// Ignore the minute field.
    Hour,
    /// Ignore minute and hour.
    Day,
    /// Check only month and weekday.
    Month,
    /// Check only the weekday.
    Weekday,
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minute" => Ok(Self::Minute),
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "month" => Ok(Self::Month),
            "weekday" => Ok(Self::Weekday),
            other => Err(format!(
                "unknown granularity '{other}' (expected minute, hour, day, month or weekday)"
            )),
        }
    }
}

/// Why a cron expression could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum CronParseError {
    /// Neither five fields nor six (with leading seconds).
    #[error("expected 5 or 6 fields, found {0}")]
    FieldCount(usize),

    /// Day-of-week value outside 0-7 or an unusable range/step.
    #[error("invalid day-of-week entry '{0}'")]
    Weekday(String),

    /// Rejected by the underlying parser.
    #[error("invalid cron syntax: {0}")]
    Syntax(#[from] cron::error::Error),
}

/// A parsed cron expression.
#[derive(Clone)]
pub struct CronExpression {
    source: String,
    schedule: Schedule,
}

impl fmt::Debug for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronExpression").field(&self.source).finish()
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl CronExpression {
    /// Parse a five-field expression (`min hour dom month dow`), or a
    /// six-field one with a leading seconds field.
    pub fn parse(expr: &str) -> Result<Self, CronParseError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let (seconds, rest) = match fields.len() {
            5 => ("0", &fields[..]),
            6 => (fields[0], &fields[1..]),
            n => return Err(CronParseError::FieldCount(n)),
        };

        let weekdays = normalize_weekdays(rest[4])?;
        let normalized = format!(
            "{seconds} {} {} {} {} {weekdays} *",
            rest[0], rest[1], rest[2], rest[3]
        );
        let schedule = Schedule::from_str(&normalized)?;

        Ok(Self {
            source: fields.join(" "),
            schedule,
        })
    }

    /// The expression as written (whitespace collapsed).
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `instant` falls on this schedule.
    ///
    /// Fields are compared from minute to weekday and the first mismatch
    /// short-circuits. Seconds are never compared.
    pub fn matches(&self, instant: &DateTime<Utc>, granularity: Granularity) -> bool {
        let s = &self.schedule;

        if granularity <= Granularity::Minute && !s.minutes().includes(instant.minute()) {
            return false;
        }
        if granularity <= Granularity::Hour && !s.hours().includes(instant.hour()) {
            return false;
        }
        if granularity <= Granularity::Day && !s.days_of_month().includes(instant.day()) {
            return false;
        }
        if granularity <= Granularity::Month && !s.months().includes(instant.month()) {
            return false;
        }
        s.days_of_week()
            .includes(instant.weekday().number_from_sunday())
    }

    /// The first scheduled instant strictly after `instant`.
    pub fn next_after(&self, instant: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(instant).next()
    }
}

/// Parse `expr` and test it against `instant`.
///
/// A malformed expression never matches.
pub fn matches(expr: &str, instant: &DateTime<Utc>, granularity: Granularity) -> bool {
    CronExpression::parse(expr)
        .map(|cron| cron.matches(instant, granularity))
        .unwrap_or(false)
}

/// Rewrite a 0-7 day-of-week field into weekday names.
///
/// Purely numeric ranges and stepped values are expanded to an explicit
/// list so that ranges ending in 7 keep working.
fn normalize_weekdays(field: &str) -> Result<String, CronParseError> {
    let mut items = Vec::new();

    for item in field.split(',') {
        let invalid = || CronParseError::Weekday(item.to_string());
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid())?;
                if step == 0 {
                    return Err(invalid());
                }
                (base, Some(step))
            }
            None => (item, None),
        };

        let range = match base.split_once('-') {
            Some((start, end)) => {
                match (weekday_number(start, item)?, weekday_number(end, item)?) {
                    (Some(start), Some(end)) => Some((start, end)),
                    (start_n, end_n) => {
                        // Mixed name/number range, let the parser judge it.
                        let start = match start_n {
                            Some(n) => weekday_name(n),
                            None => start,
                        };
                        let end = match end_n {
                            Some(n) => weekday_name(n),
                            None => end,
                        };
                        items.push(match step {
                            Some(step) => format!("{start}-{end}/{step}"),
                            None => format!("{start}-{end}"),
                        });
                        continue;
                    }
                }
            }
            None => match weekday_number(base, item)? {
                Some(n) if step.is_some() => Some((n, 7)),
                Some(n) => Some((n, n)),
                None => None,
            },
        };

        match range {
            Some((start, end)) => {
                if start > end {
                    return Err(invalid());
                }
                let days: BTreeSet<u32> = (start..=end)
                    .step_by(step.unwrap_or(1) as usize)
                    .map(|n| n % 7)
                    .collect();
                items.extend(days.into_iter().map(|n| weekday_name(n).to_string()));
            }
            None => items.push(item.to_string()),
        }
    }

    Ok(items.join(","))
}

/// Numeric weekday value of `token`, or `None` for names and wildcards.
fn weekday_number(token: &str, item: &str) -> Result<Option<u32>, CronParseError> {
    if !token.chars().all(|c| c.is_ascii_digit()) || token.is_empty() {
        return Ok(None);
    }
    match token.parse::<u32>() {
        Ok(n) if n <= 7 => Ok(Some(n)),
        _ => Err(CronParseError::Weekday(item.to_string())),
    }
}

fn weekday_name(n: u32) -> &'static str {
    WEEKDAY_NAMES[(n % 7) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_wildcard_matches_everything() {
        for instant in [
            at(2024, 1, 1, 0, 0),
            at(2024, 2, 29, 23, 59),
            at(2023, 7, 16, 12, 30),
        ] {
            assert!(matches("* * * * *", &instant, Granularity::Minute));
        }
    }

    #[test]
    fn test_new_year_midnight() {
        let expr = "0 0 1 1 *";
        // 2024-01-01 is a Monday, 2023-01-01 a Sunday.
        assert!(matches(expr, &at(2024, 1, 1, 0, 0), Granularity::Minute));
        assert!(matches(expr, &at(2023, 1, 1, 0, 0), Granularity::Minute));
        assert!(!matches(expr, &at(2024, 1, 1, 0, 1), Granularity::Minute));
        assert!(!matches(expr, &at(2024, 1, 1, 1, 0), Granularity::Minute));
        assert!(!matches(expr, &at(2024, 1, 2, 0, 0), Granularity::Minute));
        assert!(!matches(expr, &at(2024, 2, 1, 0, 0), Granularity::Minute));
    }

    #[test]
    fn test_lists_ranges_and_steps() {
        assert!(matches("*/15 * * * *", &at(2024, 3, 4, 10, 45), Granularity::Minute));
        assert!(!matches("*/15 * * * *", &at(2024, 3, 4, 10, 46), Granularity::Minute));
        assert!(matches("5,35 9-17 * * *", &at(2024, 3, 4, 17, 35), Granularity::Minute));
        assert!(!matches("5,35 9-17 * * *", &at(2024, 3, 4, 18, 5), Granularity::Minute));
        assert!(matches("0 0-12/6 * * *", &at(2024, 3, 4, 6, 0), Granularity::Minute));
        assert!(!matches("0 0-12/6 * * *", &at(2024, 3, 4, 18, 0), Granularity::Minute));
    }

    #[test]
    fn test_weekday_zero_and_seven_are_sunday() {
        // 2024-03-03 is a Sunday, 2024-03-04 a Monday.
        let sunday = at(2024, 3, 3, 9, 0);
        let monday = at(2024, 3, 4, 9, 0);
        assert!(matches("0 9 * * 0", &sunday, Granularity::Minute));
        assert!(matches("0 9 * * 7", &sunday, Granularity::Minute));
        assert!(!matches("0 9 * * 0", &monday, Granularity::Minute));
        assert!(matches("0 9 * * 1", &monday, Granularity::Minute));
    }

    #[test]
    fn test_weekday_ranges() {
        let friday = at(2024, 3, 1, 0, 0);
        let saturday = at(2024, 3, 2, 0, 0);
        let sunday = at(2024, 3, 3, 0, 0);
        let monday = at(2024, 3, 4, 0, 0);

        assert!(matches("* * * * 1-5", &monday, Granularity::Minute));
        assert!(matches("* * * * 1-5", &friday, Granularity::Minute));
        assert!(!matches("* * * * 1-5", &saturday, Granularity::Minute));

        assert!(matches("* * * * 5-7", &friday, Granularity::Minute));
        assert!(matches("* * * * 5-7", &sunday, Granularity::Minute));
        assert!(!matches("* * * * 5-7", &monday, Granularity::Minute));

        assert!(matches("* * * * MON-FRI", &monday, Granularity::Minute));
        assert!(!matches("* * * * MON-FRI", &sunday, Granularity::Minute));
    }

    #[test]
    fn test_weekday_steps() {
        let sunday = at(2024, 3, 3, 0, 0);
        let monday = at(2024, 3, 4, 0, 0);
        let tuesday = at(2024, 3, 5, 0, 0);

        assert!(matches("* * * * */2", &sunday, Granularity::Minute));
        assert!(matches("* * * * */2", &tuesday, Granularity::Minute));
        assert!(!matches("* * * * */2", &monday, Granularity::Minute));

        assert!(matches("* * * * 1/2", &monday, Granularity::Minute));
        assert!(matches("* * * * 1/2", &sunday, Granularity::Minute));
        assert!(!matches("* * * * 1/2", &tuesday, Granularity::Minute));
    }

    #[test]
    fn test_granularity_skips_finer_fields() {
        let instant = at(2024, 3, 4, 10, 15);
        assert!(!matches("30 10 * * *", &instant, Granularity::Minute));
        assert!(matches("30 10 * * *", &instant, Granularity::Hour));
        assert!(!matches("30 11 * * *", &instant, Granularity::Hour));
        assert!(matches("30 11 * * *", &instant, Granularity::Day));
        assert!(!matches("0 0 5 * *", &instant, Granularity::Day));
        assert!(matches("0 0 5 * *", &instant, Granularity::Month));
        assert!(!matches("0 0 1 1 0", &instant, Granularity::Month));
        assert!(matches("0 0 1 3 1", &instant, Granularity::Weekday));
        assert!(!matches("0 0 1 3 2", &instant, Granularity::Weekday));
    }

    #[test]
    fn test_malformed_expressions_never_match() {
        let instant = at(2024, 3, 4, 10, 15);
        for expr in [
            "",
            "not a cron",
            "* * * *",
            "* * * * * * *",
            "61 * * * *",
            "* 24 * * *",
            "* * 32 * *",
            "* * * 13 *",
            "* * * * 8",
            "* * * * 5-2",
            "* * * * */0",
        ] {
            assert!(!matches(expr, &instant, Granularity::Minute), "{expr}");
            assert!(CronExpression::parse(expr).is_err(), "{expr}");
        }
    }

    #[test]
    fn test_six_field_ignores_seconds() {
        let instant = at(2024, 3, 4, 10, 15);
        assert!(matches("30 15 10 * * *", &instant, Granularity::Minute));
        assert!(!matches("30 16 10 * * *", &instant, Granularity::Minute));
    }

    #[test]
    fn test_next_after_respects_weekday_convention() {
        let cron = CronExpression::parse("0 9 * * 1").unwrap();
        let next = cron.next_after(&at(2024, 3, 3, 12, 0)).unwrap();
        assert_eq!(next, at(2024, 3, 4, 9, 0));
    }

    #[test]
    fn test_source_is_preserved() {
        let cron = CronExpression::parse("  */5   * * * 1-5 ").unwrap();
        assert_eq!(cron.as_str(), "*/5 * * * 1-5");
        assert_eq!(cron.to_string(), "*/5 * * * 1-5");
    }

    #[test]
    fn test_granularity_from_str() {
        assert_eq!("Hour".parse::<Granularity>().unwrap(), Granularity::Hour);
        assert!("second".parse::<Granularity>().is_err());
    }
}
