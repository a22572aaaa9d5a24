//! Five-field cron patterns (`minute hour day-of-month month day-of-week`).

use crate::error::{TipError, TipResult};
use chrono::{DateTime, Datelike, TimeZone, Timelike};

/// Allowed values of one field, as a bitmask over 0..=63.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet {
    bits: u64,
    restricted: bool,
}

impl FieldSet {
    fn contains(&self, value: u32) -> bool {
        value < 64 && self.bits & (1 << value) != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    source: String,
    minutes: FieldSet,
    hours: FieldSet,
    days_of_month: FieldSet,
    months: FieldSet,
    days_of_week: FieldSet,
}

fn invalid(pattern: &str, detail: impl std::fmt::Display) -> TipError {
    TipError::InvalidArgument(format!("bad cron pattern {:?}: {}", pattern, detail))
}

fn parse_number(pattern: &str, raw: &str, min: u32, max: u32) -> TipResult<u32> {
    let value: u32 = raw
        .parse()
        .map_err(|_| invalid(pattern, format!("{:?} is not a number", raw)))?;
    if value < min || value > max {
        return Err(invalid(pattern, format!("{} is outside {}-{}", value, min, max)));
    }
    Ok(value)
}

fn parse_field(pattern: &str, field: &str, min: u32, max: u32) -> TipResult<FieldSet> {
    let mut bits = 0u64;

    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => (range, parse_number(pattern, step, 1, max)?),
            None => (part, 1),
        };

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            let (a, b) = (parse_number(pattern, a, min, max)?, parse_number(pattern, b, min, max)?);
            if a > b {
                return Err(invalid(pattern, format!("range {}-{} is reversed", a, b)));
            }
            (a, b)
        } else {
            let value = parse_number(pattern, range, min, max)?;
            // `5/15` means every 15 from 5 up to the field maximum.
            (value, if step > 1 { max } else { value })
        };

        for value in (start..=end).step_by(step as usize) {
            bits |= 1 << value;
        }
    }

    Ok(FieldSet {
        bits,
        // `*/n` still counts as unrestricted for the day-field rule.
        restricted: !field.starts_with('*'),
    })
}

impl CronSchedule {
    pub fn parse(pattern: &str) -> TipResult<Self> {
        let fields: Vec<&str> = pattern.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(invalid(pattern, format!("expected 5 fields, found {}", fields.len())));
        }

        let mut days_of_week = parse_field(pattern, fields[4], 0, 7)?;
        // 7 is an alias for Sunday.
        if days_of_week.contains(7) {
            days_of_week.bits |= 1;
        }

        Ok(CronSchedule {
            source: pattern.trim().to_string(),
            minutes: parse_field(pattern, fields[0], 0, 59)?,
            hours: parse_field(pattern, fields[1], 0, 23)?,
            days_of_month: parse_field(pattern, fields[2], 1, 31)?,
            months: parse_field(pattern, fields[3], 1, 12)?,
            days_of_week,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the minute containing `at` is a firing minute.
    pub fn matches<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        let dom = self.days_of_month.contains(at.day());
        let dow = self.days_of_week.contains(at.weekday().num_days_from_sunday());
        // When both day fields are restricted either one may match.
        let day = match (self.days_of_month.restricted, self.days_of_week.restricted) {
            (true, true) => dom || dow,
            _ => dom && dow,
        };

        day && self.minutes.contains(at.minute())
            && self.hours.contains(at.hour())
            && self.months.contains(at.month())
    }
}
