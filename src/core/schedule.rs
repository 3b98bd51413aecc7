use crate::core::trigger::{NotificationJob, RunSource};
use crate::domain::ports::Storage;
use crate::utils::error::{NotifierError, Result};
use chrono::{DateTime, Days, FixedOffset, NaiveTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A single daily firing at a local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
    offset: FixedOffset,
}

impl DailySchedule {
    /// Accepts `HH:MM` or `HH:MM:SS`.
    pub fn parse(time: &str, offset: FixedOffset) -> Result<Self> {
        let time = time.trim();
        let at = NaiveTime::parse_from_str(time, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
            .map_err(|e| NotifierError::scheduler(format!("invalid notification time '{}': {}", time, e)))?;
        Ok(Self { at, offset })
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// First firing strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_day = now.with_timezone(&self.offset).date_naive();
        let shift = chrono::Duration::seconds(self.offset.local_minus_utc() as i64);

        let today_firing = (local_day.and_time(self.at) - shift).and_utc();
        if today_firing > now {
            return today_firing;
        }

        match local_day.checked_add_days(Days::new(1)) {
            Some(next_day) => (next_day.and_time(self.at) - shift).and_utc(),
            None => today_firing + chrono::Duration::days(1),
        }
    }
}

/// Parses `+HH:MM`, `-HH:MM`, `+HH`, `Z` or `UTC`.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let trimmed = raw.trim();
    let invalid = |reason: &str| NotifierError::InvalidConfigValueError {
        field: "schedule.utc_offset".to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| invalid("out of range"));
    }

    let (sign, rest) = match trimmed.chars().next() {
        Some('+') => (1, &trimmed[1..]),
        Some('-') => (-1, &trimmed[1..]),
        _ => return Err(invalid("expected a leading '+' or '-'")),
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None => (rest, "0"),
    };

    let hours: i32 = hours.parse().map_err(|_| invalid("hours are not a number"))?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid("minutes are not a number"))?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(invalid("out of range"));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(|| invalid("out of range"))
}

/// Registers the daily firing for `job`. On failure the job is marked
/// disabled and a `SchedulerError` is returned for the operator.
pub fn register<S: Storage + 'static>(job: Arc<NotificationJob<S>>, time: &str) -> Result<(DailySchedule, JoinHandle<()>)> {
    let schedule = match DailySchedule::parse(time, job.offset()) {
        Ok(schedule) => schedule,
        Err(e) => {
            job.disable();
            tracing::error!("🛑 Daily trigger disabled: {}", e);
            return Err(e);
        }
    };

    let runtime = match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle,
        Err(e) => {
            job.disable();
            tracing::error!("🛑 Daily trigger disabled: no async runtime");
            return Err(NotifierError::scheduler(e.to_string()));
        }
    };

    let handle = runtime.spawn(run_daily(job, schedule));
    Ok((schedule, handle))
}

/// Timer loop: each firing is awaited to completion before the next one is
/// computed.
async fn run_daily<S: Storage + 'static>(job: Arc<NotificationJob<S>>, schedule: DailySchedule) {
    loop {
        let now = job.now();
        let next = schedule.next_after(now);
        let wait = (next - now).to_std().unwrap_or_default();

        tracing::info!(
            "⏰ Next notification run at {} (in {}m)",
            next.with_timezone(&schedule.offset()).format("%Y-%m-%d %H:%M %:z"),
            wait.as_secs() / 60
        );

        tokio::time::sleep(wait).await;

        // Failures are logged by the job and never stop the timer.
        let _ = job.run_once(RunSource::Scheduled).await;
    }
}
