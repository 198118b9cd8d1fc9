//! Extended crontab expression decoding.
//!
//! Expressions carry 5, 6 or 7 whitespace-separated fields:
//!
//! | tokens | fields                                                   |
//! |--------|----------------------------------------------------------|
//! | 5      | minute hour day month day_of_week                        |
//! | 6      | second minute hour day month day_of_week                 |
//! | 7      | second minute hour day month day_of_week year            |
//!
//! The token count is the only disambiguator. A 5-token expression is always
//! the classic form, even when its last field looks like a year.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Loose shape check: 5 to 7 groups of digits, names, `*`, `?`, ranges,
/// lists and steps. Field ranges are validated when a trigger is built.
static CRONTAB_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[0-9A-Za-z*?/,#-]+(\s+[0-9A-Za-z*?/,#-]+){4,6}\s*$").unwrap()
});

/// The seven fields of a decoded trigger expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronFields {
    pub second: Option<String>,
    pub minute: Option<String>,
    pub hour: Option<String>,
    pub day: Option<String>,
    pub month: Option<String>,
    pub day_of_week: Option<String>,
    pub year: Option<String>,
}

/// Split a trigger expression into its fields.
pub fn decode(expression: &str) -> Result<CronFields, ModelError> {
    let tokens: Vec<String> = expression.split_whitespace().map(str::to_string).collect();
    let fields = match tokens.as_slice() {
        [minute, hour, day, month, dow] => CronFields {
            second: None,
            minute: Some(minute.clone()),
            hour: Some(hour.clone()),
            day: Some(day.clone()),
            month: Some(month.clone()),
            day_of_week: Some(dow.clone()),
            year: None,
        },
        [second, minute, hour, day, month, dow] => CronFields {
            second: Some(second.clone()),
            minute: Some(minute.clone()),
            hour: Some(hour.clone()),
            day: Some(day.clone()),
            month: Some(month.clone()),
            day_of_week: Some(dow.clone()),
            year: None,
        },
        [second, minute, hour, day, month, dow, year] => CronFields {
            second: Some(second.clone()),
            minute: Some(minute.clone()),
            hour: Some(hour.clone()),
            day: Some(day.clone()),
            month: Some(month.clone()),
            day_of_week: Some(dow.clone()),
            year: Some(year.clone()),
        },
        _ => return Err(ModelError::InvalidTriggerSyntax(expression.to_string())),
    };
    Ok(fields)
}

/// Whether `expression` passes the loose crontab shape check.
pub fn is_crontab_shape(expression: &str) -> bool {
    CRONTAB_SHAPE.is_match(expression)
}

impl CronFields {
    /// Render the 7-field expression understood by the `cron` crate.
    ///
    /// A missing second becomes `0` and a missing year becomes `*`. Numeric
    /// day-of-week values use the crontab convention (0 and 7 are Sunday) and
    /// are translated to the crate's 1-7 numbering where 1 is Sunday.
    pub fn to_schedule_expression(&self) -> String {
        let field = |value: &Option<String>, fallback: &'static str| {
            value.as_deref().unwrap_or(fallback).to_string()
        };
        let dow = translate_day_of_week(self.day_of_week.as_deref().unwrap_or("*"));
        format!(
            "{} {} {} {} {} {} {}",
            field(&self.second, "0"),
            field(&self.minute, "*"),
            field(&self.hour, "*"),
            field(&self.day, "*"),
            field(&self.month, "*"),
            dow,
            field(&self.year, "*"),
        )
    }
}

fn translate_day_of_week(field: &str) -> String {
    field
        .split(',')
        .map(translate_day_of_week_item)
        .collect::<Vec<_>>()
        .join(",")
}

/// Items with names, `*`, `?` or out-of-range numbers pass through untouched.
fn translate_day_of_week_item(item: &str) -> String {
    if item == "*" || item == "?" || item.chars().any(|c| c.is_ascii_alphabetic()) {
        return item.to_string();
    }

    let (range, step) = match item.split_once('/') {
        Some((range, step)) => match step.parse::<u32>() {
            Ok(step) if step > 0 => (range, Some(step)),
            _ => return item.to_string(),
        },
        None => (item, None),
    };

    let bounds = if range == "*" {
        Some((0, 6))
    } else if let Some((start, end)) = range.split_once('-') {
        start.parse::<u32>().ok().zip(end.parse::<u32>().ok())
    } else {
        range
            .parse::<u32>()
            .ok()
            .map(|start| if step.is_some() { (start, 6) } else { (start, start) })
    };

    let Some((start, end)) = bounds else {
        return item.to_string();
    };
    if start > end || end > 7 {
        return item.to_string();
    }

    let days: BTreeSet<u32> = (start..=end)
        .step_by(step.unwrap_or(1) as usize)
        .map(|day| day % 7 + 1)
        .collect();
    render_runs(&days)
}

/// Render sorted values as a list where consecutive runs become ranges.
fn render_runs(values: &BTreeSet<u32>) -> String {
    let mut parts = Vec::new();
    let mut iter = values.iter().copied().peekable();
    while let Some(first) = iter.next() {
        let mut last = first;
        while iter.peek() == Some(&(last + 1)) {
            last += 1;
            iter.next();
        }
        if first == last {
            parts.push(first.to_string());
        } else {
            parts.push(format!("{first}-{last}"));
        }
    }
    parts.join(",")
}
