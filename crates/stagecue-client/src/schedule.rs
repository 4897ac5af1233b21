//! Clock-time parsing and deferred action planning.
//!
//! Times are whole minutes, `HH:MM` in 24-hour form, interpreted in the
//! timezone of the `now` they are planned against.

use std::time::Duration;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

use crate::ClientError;

/// Parse `HH:MM` (24-hour). Anything else is `InvalidSchedule`.
pub fn parse_clock_time(text: &str) -> Result<NaiveTime, ClientError> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M").map_err(|_| {
        ClientError::InvalidSchedule(format!(
            "{text:?} is not a valid time, use HH:MM (24-hour)"
        ))
    })
}

/// First instant strictly after `now` at `time` of day. A time equal to or
/// before `now` lands on the following day.
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, time: NaiveTime) -> Option<DateTime<Tz>> {
    next_matching(now, time, 3, |_| true)
}

/// First instant strictly after `now` on `day` at `time`. Can be later today.
pub fn next_occurrence_on<Tz: TimeZone>(
    now: &DateTime<Tz>,
    day: Weekday,
    time: NaiveTime,
) -> Option<DateTime<Tz>> {
    next_matching(now, time, 15, |date| date.weekday() == day)
}

fn next_matching<Tz: TimeZone>(
    now: &DateTime<Tz>,
    time: NaiveTime,
    horizon_days: u64,
    accept: impl Fn(NaiveDate) -> bool,
) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive();
    for offset in 0..horizon_days {
        let date = today.checked_add_days(Days::new(offset))?;
        if !accept(date) {
            continue;
        }
        // `earliest` covers DST folds; a gap yields None and we move on.
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(time)).earliest() {
            if candidate > *now {
                return Some(candidate);
            }
        }
    }
    None
}

/// Start at `target`, optionally stop `stop_after` later.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledAction<Tz: TimeZone> {
    pub target: DateTime<Tz>,
    pub stop_after: Option<Duration>,
}

impl<Tz: TimeZone> ScheduledAction<Tz> {
    /// Plan against `now`. A zero duration means no automatic stop.
    pub fn plan(
        at: &str,
        duration_minutes: Option<u64>,
        now: &DateTime<Tz>,
    ) -> Result<Self, ClientError> {
        let time = parse_clock_time(at)?;
        let target = next_occurrence(now, time).ok_or_else(|| {
            ClientError::InvalidSchedule(format!("no upcoming local time matches {at:?}"))
        })?;
        let stop_after = duration_minutes
            .filter(|minutes| *minutes > 0)
            .map(|minutes| Duration::from_secs(minutes.saturating_mul(60)));
        Ok(Self { target, stop_after })
    }

    /// How long to sleep from `now` until `target`; zero if already past.
    pub fn wait_from(&self, now: &DateTime<Utc>) -> Duration {
        (self.target.with_timezone(&Utc) - *now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}
