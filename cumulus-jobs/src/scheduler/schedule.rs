use chrono::{Local, Utc};
use cumulus_core::{config::Timezone, Timestamp};
use std::{str::FromStr, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("empty cron expression")]
    Empty,
    #[error("unknown cron descriptor '{0}'")]
    UnknownDescriptor(String),
    #[error("invalid interval in '{0}'")]
    InvalidInterval(String, #[source] humantime::DurationError),
    #[error("cron expression '{0}' must have 5, 6 or 7 fields")]
    FieldCount(String),
    #[error("invalid cron expression '{0}'")]
    Invalid(String, #[source] cron::error::Error),
}

#[derive(Debug, Clone)]
pub enum Schedule {
    /// Fires whenever any of the schedules fires.
    Cron(Vec<cron::Schedule>),
    Every(Duration),
}

fn descriptor(name: &str) -> Option<&'static str> {
    let expression = match name {
        "@yearly" | "@annually" => "0 0 1 1 *",
        "@monthly" => "0 0 1 * *",
        "@weekly" => "0 0 * * 0",
        "@daily" | "@midnight" => "0 0 * * *",
        "@hourly" => "0 * * * *",
        _ => return None,
    };
    Some(expression)
}

// Standard cron counts weekdays 0-6 from Sunday (7 is Sunday too), the cron
// crate counts 1-7 from Sunday.
fn weekday_values(item: &str) -> Option<Vec<u32>> {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => (range, Some(step.parse::<u32>().ok().filter(|s| *s > 0)?)),
        None => (item, None),
    };
    let (start, end) = match range.split_once('-') {
        Some((start, end)) => (start.parse::<u32>().ok()?, end.parse::<u32>().ok()?),
        None => {
            let start = range.parse::<u32>().ok()?;
            (start, if step.is_some() { 6 } else { start })
        }
    };
    if start > end || end > 7 {
        return None;
    }
    Some(
        (start..=end)
            .step_by(step.unwrap_or(1) as usize)
            .map(|day| day % 7 + 1)
            .collect(),
    )
}

fn convert_weekdays(field: &str) -> String {
    field
        .split(',')
        .map(|item| match weekday_values(item) {
            Some(mut days) => {
                days.sort_unstable();
                days.dedup();
                days.iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            }
            None => item.to_owned(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn to_cron_crate_syntax(expression: &str) -> Result<Vec<String>, ParseError> {
    let mut fields: Vec<String> = match expression.split_whitespace().collect::<Vec<_>>() {
        fields if fields.len() == 5 => {
            let mut converted = vec!["0".to_owned()];
            converted.extend(fields[..4].iter().map(|f| f.to_string()));
            converted.push(convert_weekdays(fields[4]));
            converted
        }
        fields if fields.len() == 6 || fields.len() == 7 => {
            fields.iter().map(|f| f.to_string()).collect()
        }
        _ => return Err(ParseError::FieldCount(expression.to_owned())),
    };

    // The cron crate requires both day fields to match. Standard cron fires
    // when either matches as soon as both are restricted.
    const DAY_OF_MONTH: usize = 3;
    const DAY_OF_WEEK: usize = 5;
    let restricted = |idx: usize| fields[idx] != "*" && fields[idx] != "?";
    if !(restricted(DAY_OF_MONTH) && restricted(DAY_OF_WEEK)) {
        return Ok(vec![fields.join(" ")]);
    }
    let day_of_week = std::mem::replace(&mut fields[DAY_OF_WEEK], "*".to_owned());
    let by_month_day = fields.join(" ");
    fields[DAY_OF_WEEK] = day_of_week;
    fields[DAY_OF_MONTH] = "*".to_owned();
    Ok(vec![by_month_day, fields.join(" ")])
}

impl FromStr for Schedule {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::Empty);
        }
        if let Some(interval) = s.strip_prefix("@every") {
            let interval = humantime::parse_duration(interval.trim())
                .map_err(|e| ParseError::InvalidInterval(s.to_owned(), e))?;
            return Ok(Schedule::Every(interval));
        }
        let expression = if s.starts_with('@') {
            descriptor(s)
                .ok_or_else(|| ParseError::UnknownDescriptor(s.to_owned()))?
                .to_owned()
        } else {
            s.to_owned()
        };
        let schedules = to_cron_crate_syntax(&expression)?
            .iter()
            .map(|e| cron::Schedule::from_str(e))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ParseError::Invalid(s.to_owned(), e))?;
        Ok(Schedule::Cron(schedules))
    }
}

impl Schedule {
    /// The first fire time strictly after `after`, or `None` if the schedule
    /// never fires again.
    pub fn next_after(&self, after: Timestamp, timezone: Timezone) -> Option<Timestamp> {
        match self {
            Schedule::Every(interval) => {
                let interval = chrono::Duration::from_std(*interval).ok()?;
                after.checked_add_signed(interval)
            }
            Schedule::Cron(schedules) => schedules
                .iter()
                .filter_map(|schedule| match timezone {
                    Timezone::Utc => schedule.after(&after).next(),
                    Timezone::Local => schedule
                        .after(&after.with_timezone(&Local))
                        .next()
                        .map(|next| next.with_timezone(&Utc)),
                })
                .min(),
        }
    }
}
