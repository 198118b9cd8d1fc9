//! Cron triggers.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use supertask_core::error::AppError;
use supertask_core::result::AppResult;
use supertask_entity::TriggerState;
use supertask_entity::cron::decode;

/// One or more cron expressions evaluated in a timezone. The trigger fires at
/// the earliest upcoming time of any of its expressions.
#[derive(Debug, Clone)]
pub struct CronTrigger {
    expressions: Vec<String>,
    schedules: Vec<Schedule>,
    timezone: Tz,
}

impl CronTrigger {
    /// Build a trigger, fully validating every expression.
    pub fn new(expressions: &[String], timezone: &str) -> AppResult<Self> {
        if expressions.is_empty() {
            return Err(AppError::validation("A trigger needs at least one expression"));
        }
        let timezone = parse_timezone(timezone)?;
        let schedules = expressions
            .iter()
            .map(|expr| {
                let fields = decode(expr)?;
                Schedule::from_str(&fields.to_schedule_expression()).map_err(|e| {
                    AppError::validation(format!("Invalid crontab syntax: {expr}: {e}"))
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self {
            expressions: expressions.to_vec(),
            schedules,
            timezone,
        })
    }

    /// Rebuild a trigger from its persisted state.
    pub fn from_state(state: &TriggerState) -> AppResult<Self> {
        Self::new(&state.expressions, &state.timezone)
    }

    /// Persistable trigger arguments.
    pub fn state(&self) -> TriggerState {
        TriggerState {
            expressions: self.expressions.clone(),
            timezone: self.timezone.name().to_string(),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// The earliest fire time strictly after `after`, or `None` when every
    /// expression is exhausted.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.timezone);
        self.schedules
            .iter()
            .filter_map(|schedule| schedule.after(&local).next())
            .map(|next| next.with_timezone(&Utc))
            .min()
    }
}

/// Parse an IANA timezone name.
pub fn parse_timezone(timezone: &str) -> AppResult<Tz> {
    timezone
        .parse::<Tz>()
        .map_err(|_| AppError::configuration(format!("Unknown timezone '{timezone}'")))
}
