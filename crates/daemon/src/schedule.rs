use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dog_watcher_remote::Exporter;
use dog_watcher_vcs::VersionControl;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::config::ConfigError;
use crate::coordinator::{log_result, BackupCoordinator};

/// Cron schedule for recurring backups.
///
/// Accepts the usual five-field form (minute first, Sunday is day 0 or 7) as well as the six or
/// seven field form understood by the `cron` crate (seconds first, optional year, Sunday is day 1).
#[derive(Debug, Clone)]
pub struct BackupSchedule {
    expression: String,
    schedule: cron::Schedule,
}

impl BackupSchedule {
    pub fn parse(expression: &str) -> Result<Self, ConfigError> {
        let trimmed = expression.trim();
        let mut fields: Vec<String> = trimmed.split_whitespace().map(str::to_owned).collect();
        let normalized = if fields.len() == 5 {
            fields[4] = to_cron_weekdays(&fields[4]);
            format!("0 {}", fields.join(" "))
        } else {
            trimmed.to_owned()
        };
        let schedule =
            cron::Schedule::from_str(&normalized).map_err(|e| ConfigError::InvalidSchedule {
                expr: expression.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            expression: expression.to_owned(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&now).next()
    }
}

/// Rewrite a standard day-of-week field (0-7, Sunday is 0 or 7) into the `cron` crate's
/// numbering (1-7, Sunday is 1). Day names and anything unparseable pass through untouched.
fn to_cron_weekdays(field: &str) -> String {
    if field == "*" || field == "?" {
        return field.to_owned();
    }
    let mut days = BTreeSet::new();
    let mut passthrough = Vec::new();
    for part in field.split(',') {
        match expand_weekdays(part) {
            Some(expanded) => days.extend(expanded.into_iter().map(|d| d % 7 + 1)),
            None => passthrough.push(part.to_owned()),
        }
    }
    days.iter()
        .map(u8::to_string)
        .chain(passthrough)
        .collect::<Vec<_>>()
        .join(",")
}

/// Expand one numeric list element (`3`, `1-5`, `*/2`, `1-5/2`) into standard weekdays.
fn expand_weekdays(part: &str) -> Option<Vec<u8>> {
    let (base, step) = match part.split_once('/') {
        Some((base, step)) => (base, Some(step.parse::<u8>().ok().filter(|s| *s > 0)?)),
        None => (part, None),
    };
    let (start, end) = match base.split_once('-') {
        Some((a, b)) => (a.parse::<u8>().ok()?, b.parse::<u8>().ok()?),
        None if base == "*" => (0, 6),
        None => {
            let day = base.parse::<u8>().ok()?;
            (day, if step.is_some() { 6 } else { day })
        }
    };
    if start > end || end > 7 {
        return None;
    }
    Some(
        (start..=end)
            .step_by(usize::from(step.unwrap_or(1)))
            .collect(),
    )
}

/// Run a backup at every fire time of `schedule` until ctrl-c.
///
/// Each run is awaited before the next fire time is computed, so runs never overlap; fire
/// times missed while a run was in progress are skipped.
pub async fn scheduler_loop<V, E>(coordinator: &BackupCoordinator<V, E>, schedule: &BackupSchedule)
where
    V: VersionControl,
    E: Exporter,
{
    loop {
        let now = Utc::now();
        let Some(next) = schedule.next_after(now) else {
            warn!(schedule = schedule.expression(), "schedule has no upcoming fire times");
            return;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        info!(%next, "next backup scheduled");

        tokio::select! {
            _ = sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down scheduler");
                return;
            }
        }

        coordinator.run_with(log_result).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Weekday};

    #[test]
    fn five_field_expressions_fire_on_the_minute() {
        let schedule = BackupSchedule::parse("30 2 * * *").expect("valid");
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let next = schedule.next_after(now).expect("next");
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 2, 2, 30, 0).unwrap());
        assert_eq!(schedule.expression(), "30 2 * * *");
    }

    #[test]
    fn six_field_expressions_are_used_as_is() {
        let schedule = BackupSchedule::parse("0 */15 * * * *").expect("valid");
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 7, 0).unwrap();
        let next = schedule.next_after(now).expect("next");
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 1, 12, 15, 0).unwrap());
    }

    fn weekdays(expression: &str, fires: usize) -> Vec<Weekday> {
        let schedule = BackupSchedule::parse(expression).expect("valid");
        // 2026-03-01 is a Sunday.
        let mut now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut days = Vec::new();
        for _ in 0..fires {
            now = schedule.next_after(now).expect("next");
            days.push(now.weekday());
        }
        days
    }

    #[test]
    fn five_field_weekdays_use_standard_numbering() {
        assert_eq!(weekdays("0 3 * * 1", 1), vec![Weekday::Mon]);
        assert_eq!(
            weekdays("0 3 * * 1-5", 5),
            vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri
            ]
        );
        assert_eq!(
            weekdays("0 3 * * 5-7", 3),
            vec![Weekday::Fri, Weekday::Sat, Weekday::Sun]
        );
    }

    #[test]
    fn sunday_is_zero_or_seven() {
        let schedule = BackupSchedule::parse("0 3 * * 0").expect("sunday as 0");
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            schedule.next_after(now),
            Some(Utc.with_ymd_and_hms(2026, 3, 8, 3, 0, 0).unwrap())
        );
        assert_eq!(weekdays("0 3 * * 7", 1), vec![Weekday::Sun]);
    }

    #[test]
    fn weekday_fields_are_renumbered() {
        assert_eq!(to_cron_weekdays("*"), "*");
        assert_eq!(to_cron_weekdays("0,7"), "1");
        assert_eq!(to_cron_weekdays("1-5"), "2,3,4,5,6");
        assert_eq!(to_cron_weekdays("*/2"), "1,3,5,7");
        assert_eq!(to_cron_weekdays("1-5/2"), "2,4,6");
        assert_eq!(to_cron_weekdays("MON-FRI"), "MON-FRI");
        assert_eq!(to_cron_weekdays("6,SUN"), "7,SUN");
    }

    #[test]
    fn out_of_range_weekday_is_rejected() {
        assert!(BackupSchedule::parse("0 3 * * 8").is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let err = BackupSchedule::parse("not a cron").unwrap_err();
        match err {
            ConfigError::InvalidSchedule { expr, .. } => assert_eq!(expr, "not a cron"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
