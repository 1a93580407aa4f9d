// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron-style recurrence rules evaluated in local time.
//!
//! Accepted forms:
//! - 5 fields `minute hour day-of-month month day-of-week`, where
//!   day-of-week `0` and `7` are Sunday. When both day fields are
//!   restricted a day matches if either one does;
//! - `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`, `@midnight`,
//!   `@hourly`;
//! - `@every <duration>` (`90s`, `15m`, `1h30m`), a fixed interval counted
//!   from when the rule was parsed;
//! - 6 or 7 fields with a leading seconds field, passed to the parser as-is.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, TimeDelta};
use cron::Schedule;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Malformed recurrence expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid schedule {expression:?}: {reason}")]
pub struct ScheduleParseError {
    pub expression: String,
    pub reason: String,
}

impl ScheduleParseError {
    fn new(expression: &str, reason: impl Into<String>) -> Self {
        Self { expression: expression.to_owned(), reason: reason.into() }
    }
}

#[derive(Clone)]
enum Rule {
    /// Fires at the earliest next occurrence of any schedule.
    Calendar(Vec<Schedule>),
    /// Fires at `anchor + k * interval`, `k >= 1`.
    Every { interval: TimeDelta, anchor: DateTime<Local> },
}

/// Parsed recurrence rule plus the text it came from.
#[derive(Clone)]
pub struct Recurrence {
    expression: String,
    rule: Rule,
}

impl fmt::Debug for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Recurrence({:?})", self.expression)
    }
}

impl Recurrence {
    pub fn parse(expression: &str) -> Result<Self, ScheduleParseError> {
        Self::parse_anchored(expression, Local::now())
    }

    /// Parse with `@every` intervals counted from `anchor`.
    pub fn parse_anchored(
        expression: &str,
        anchor: DateTime<Local>,
    ) -> Result<Self, ScheduleParseError> {
        let trimmed = expression.trim();
        let rule = match every_interval(trimmed) {
            Some(spec) => {
                let interval = parse_interval(spec)
                    .ok_or_else(|| ScheduleParseError::new(expression, "bad @every duration"))?;
                Rule::Every { interval, anchor }
            }
            None => {
                let schedules = normalize(expression)?
                    .iter()
                    .map(|s| Schedule::from_str(s))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| ScheduleParseError::new(expression, e.to_string()))?;
                if schedules.iter().all(|s| s.upcoming(Local).next().is_none()) {
                    return Err(ScheduleParseError::new(expression, "never fires"));
                }
                Rule::Calendar(schedules)
            }
        };
        Ok(Self { expression: trimmed.to_owned(), rule })
    }

    /// Original text, as given at creation.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `after`.
    pub fn next_after(&self, after: &DateTime<Local>) -> Option<DateTime<Local>> {
        match &self.rule {
            Rule::Calendar(schedules) => {
                schedules.iter().filter_map(|s| s.after(after).next()).min()
            }
            Rule::Every { interval, anchor } => {
                let step = interval.num_milliseconds();
                let elapsed = (*after - *anchor).num_milliseconds();
                let k = if elapsed < 0 { 1 } else { elapsed / step + 1 };
                anchor.checked_add_signed(TimeDelta::try_milliseconds(step.checked_mul(k)?)?)
            }
        }
    }
}

/// The duration text of an `@every` expression, if it is one.
fn every_interval(trimmed: &str) -> Option<&str> {
    let (head, rest) = trimmed.split_once(char::is_whitespace).unwrap_or((trimmed, ""));
    head.eq_ignore_ascii_case("@every").then(|| rest.trim())
}

/// Parse durations like `90s`, `15m` or `1h30m` into a positive interval.
fn parse_interval(s: &str) -> Option<TimeDelta> {
    let mut total_secs: i64 = 0;
    let mut num_buf = String::new();

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
            continue;
        }
        let n: i64 = num_buf.parse().ok()?;
        num_buf.clear();
        let unit = match ch {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        total_secs = total_secs.checked_add(n.checked_mul(unit)?)?;
    }

    if !num_buf.is_empty() || total_secs <= 0 {
        return None;
    }
    TimeDelta::try_seconds(total_secs)
}

/// Rewrite an accepted expression into the 6/7-field forms the parser takes.
///
/// A 5-field expression restricting both day-of-month and day-of-week
/// yields two schedules, one per day field, whose union is the rule.
fn normalize(expression: &str) -> Result<Vec<String>, ScheduleParseError> {
    let trimmed = expression.trim();
    if trimmed.starts_with('@') {
        let mapped = match trimmed.to_ascii_lowercase().as_str() {
            "@yearly" | "@annually" => "0 0 0 1 1 *",
            "@monthly" => "0 0 0 1 * *",
            "@weekly" => "0 0 0 * * Sun",
            "@daily" | "@midnight" => "0 0 0 * * *",
            "@hourly" => "0 0 * * * *",
            _ => return Err(ScheduleParseError::new(expression, "unknown macro")),
        };
        return Ok(vec![mapped.to_owned()]);
    }

    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    match fields.len() {
        5 => {
            let (min, hour, dom, month) = (fields[0], fields[1], fields[2], fields[3]);
            let dow = translate_day_of_week(fields[4])
                .map_err(|reason| ScheduleParseError::new(expression, reason))?;
            if is_unrestricted(dom) || is_unrestricted(&dow) {
                Ok(vec![format!("0 {min} {hour} {dom} {month} {dow}")])
            } else {
                Ok(vec![
                    format!("0 {min} {hour} {dom} {month} *"),
                    format!("0 {min} {hour} * {month} {dow}"),
                ])
            }
        }
        6 | 7 => Ok(vec![fields.join(" ")]),
        n => Err(ScheduleParseError::new(expression, format!("expected 5 fields, got {n}"))),
    }
}

fn is_unrestricted(field: &str) -> bool {
    field == "*" || field == "?"
}

/// Translate a standard day-of-week field (0-7, Sunday = 0 or 7) into day
/// names, which the parser reads without numbering ambiguity.
fn translate_day_of_week(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_owned());
    }
    if field.chars().any(|c| c.is_ascii_alphabetic()) {
        return Ok(field.to_owned());
    }

    let mut days = [false; 7];
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((r, s)) => {
                let step: u32 = s.parse().map_err(|_| format!("bad step {s:?}"))?;
                if step == 0 {
                    return Err("step must be positive".to_owned());
                }
                (r, step)
            }
            None => (item, 1),
        };
        let (lo, hi) = match range {
            "*" => (0, 6),
            r => match r.split_once('-') {
                Some((a, b)) => (parse_day(a)?, parse_day(b)?),
                None => {
                    let d = parse_day(r)?;
                    (d, if step > 1 { 7 } else { d })
                }
            },
        };
        if lo > hi {
            return Err(format!("descending day range {range:?}"));
        }
        let mut d = lo;
        while d <= hi {
            days[(d % 7) as usize] = true;
            d += step;
        }
    }

    let names: Vec<&str> =
        days.iter().zip(DAY_NAMES).filter(|(set, _)| **set).map(|(_, n)| n).collect();
    Ok(names.join(","))
}

fn parse_day(s: &str) -> Result<u32, String> {
    match s.parse::<u32>() {
        Ok(d) if d <= 7 => Ok(d),
        _ => Err(format!("day of week {s:?} out of range 0-7")),
    }
}

#[cfg(test)]
#[path = "recurrence_tests.rs"]
mod tests;
