use anyhow::Context;
use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A cron expression. Standard 5-field Unix expressions are accepted as well
/// as the 6/7-field (seconds, optional year) form.
#[derive(Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> anyhow::Result<Self> {
        let expression = expression.trim();
        let schedule = Schedule::from_str(&expand_expression(expression))
            .with_context(|| format!("parsing cron schedule '{expression}'"))?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.after(after).next()
    }
}

impl FromStr for CronSchedule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronSchedule").field(&self.expression).finish()
    }
}

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// 5-field expressions get a zero seconds field and a wildcard year, and
/// their Unix day-of-week numbers (0 or 7 = Sunday) become day names.
fn expand_expression(expression: &str) -> String {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.as_slice() {
        [minute, hour, day, month, weekday] => {
            let weekday = unix_weekday_field(weekday);
            format!("0 {minute} {hour} {day} {month} {weekday} *")
        }
        _ => expression.to_string(),
    }
}

fn unix_weekday_field(field: &str) -> String {
    field
        .split(',')
        .map(|item| unix_weekday_item(item).unwrap_or_else(|| item.to_string()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Rewrites one numeric list item (`a`, `a-b`, `a/s`, `a-b/s`) as an explicit
/// list of day names. Anything else is left for the cron parser to judge;
/// `*` and `*/s` already mean the same days in both numberings.
fn unix_weekday_item(item: &str) -> Option<String> {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => (range, Some(step.parse::<usize>().ok()?)),
        None => (item, None),
    };
    let (start, end) = match range.split_once('-') {
        Some((start, end)) => (parse_unix_weekday(start)?, parse_unix_weekday(end)?),
        None => {
            let start = parse_unix_weekday(range)?;
            (start, if step.is_some() { 6 } else { start })
        }
    };
    let step = step.unwrap_or(1);
    if step == 0 || start > end {
        return None;
    }
    let mut names: Vec<&str> = Vec::new();
    for day in (start..=end).step_by(step) {
        let name = WEEKDAY_NAMES[day % 7];
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Some(names.join(","))
}

fn parse_unix_weekday(value: &str) -> Option<usize> {
    value.parse::<usize>().ok().filter(|day| *day <= 7)
}

/// Invokes `job` at every occurrence of `schedule` until `cancel` fires.
///
/// Occurrences are served one at a time; an occurrence that passes while a
/// job is still running is skipped. Job failures are logged and do not stop
/// the loop.
pub async fn run_on_schedule<F, Fut>(
    schedule: &CronSchedule,
    run_immediately: bool,
    cancel: &CancellationToken,
    mut job: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    info!(schedule = schedule.expression(), "running on cron schedule");
    let mut failures: u32 = 0;
    if run_immediately {
        run_logged(&mut job, &mut failures).await;
    }

    loop {
        if cancel.is_cancelled() {
            break;
        }
        let now = Local::now();
        let Some(next) = schedule.next_after(&now) else {
            warn!(schedule = schedule.expression(), "cron schedule has no upcoming executions");
            break;
        };
        info!("awaiting next cron execution at {}", next.to_rfc2822());
        let wait = (next - now).to_std().unwrap_or_default();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
        run_logged(&mut job, &mut failures).await;
    }
    info!("cron schedule stopped");
}

async fn run_logged<F, Fut>(job: &mut F, failures: &mut u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    match job().await {
        Ok(()) => *failures = 0,
        Err(err) => {
            *failures = failures.saturating_add(1);
            warn!(error = %format!("{err:#}"), failures = *failures, "run failed");
        }
    }
}
