//! Weekly recurring scheduler -- fires a callback at configured
//! (day-of-week, HH:MM) slots.
//!
//! Background loop driven by an injected `Ticker`. On each tick:
//!   1. read the clock
//!   2. hand every due entry to `on_fire`
//!   3. reschedule those entries to their next weekly slot
//!
//! The loop never talks to the server itself; `Trigger::serve` binds
//! `on_fire` to spawning a `Trigger::fire_until()` session.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeZone, Weekday};
use tokio::sync::broadcast;
use tokio::time::{Interval, MissedTickBehavior};

use crate::schedule::{next_occurrence_on, parse_clock_time};
use crate::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyEntry {
    pub day: Weekday,
    pub time: NaiveTime,
}

impl WeeklyEntry {
    pub fn parse(day: &str, time: &str) -> Result<Self, ClientError> {
        let day = Weekday::from_str(day.trim())
            .map_err(|_| ClientError::InvalidSchedule(format!("{day:?} is not a day of the week")))?;
        Ok(Self {
            day,
            time: parse_clock_time(time)?,
        })
    }
}

impl fmt::Display for WeeklyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let day = match self.day {
            Weekday::Mon => "Monday",
            Weekday::Tue => "Tuesday",
            Weekday::Wed => "Wednesday",
            Weekday::Thu => "Thursday",
            Weekday::Fri => "Friday",
            Weekday::Sat => "Saturday",
            Weekday::Sun => "Sunday",
        };
        write!(f, "{day} at {}", self.time.format("%H:%M"))
    }
}

/// Paces the scheduler loop.
pub trait Ticker: Send {
    fn tick(&mut self) -> impl Future<Output = ()> + Send;
}

pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

struct Job<Tz: TimeZone> {
    entry: WeeklyEntry,
    next_run: Option<DateTime<Tz>>,
}

pub struct RecurringScheduler<Tz: TimeZone> {
    jobs: Vec<Job<Tz>>,
}

impl<Tz: TimeZone> RecurringScheduler<Tz> {
    pub fn new(entries: Vec<WeeklyEntry>, now: &DateTime<Tz>) -> Self {
        let jobs = entries
            .into_iter()
            .map(|entry| Job {
                entry,
                next_run: next_occurrence_on(now, entry.day, entry.time),
            })
            .collect();
        Self { jobs }
    }

    /// Earliest upcoming run across all entries.
    pub fn next_run(&self) -> Option<&DateTime<Tz>> {
        self.jobs.iter().filter_map(|job| job.next_run.as_ref()).min()
    }

    /// Entries whose slot has arrived. Each is moved on to its next weekly
    /// slot after `now`, so a slot fires at most once however late the tick.
    pub fn due(&mut self, now: &DateTime<Tz>) -> Vec<WeeklyEntry> {
        let mut fired = Vec::new();
        for job in &mut self.jobs {
            let is_due = matches!(&job.next_run, Some(next_run) if next_run <= now);
            if is_due {
                fired.push(job.entry);
                job.next_run = next_occurrence_on(now, job.entry.day, job.entry.time);
            }
        }
        fired
    }

    /// Run until shutdown fires (or its sender is dropped).
    pub async fn run<T, N, F>(
        mut self,
        mut ticker: T,
        clock: N,
        mut on_fire: F,
        mut shutdown: broadcast::Receiver<()>,
    ) where
        T: Ticker,
        N: Fn() -> DateTime<Tz>,
        F: FnMut(WeeklyEntry),
    {
        for job in &self.jobs {
            match &job.next_run {
                Some(next_run) => tracing::info!(
                    entry = %job.entry,
                    next_run = %next_run.naive_local(),
                    "scheduled"
                ),
                None => tracing::warn!(entry = %job.entry, "entry has no upcoming slot"),
            }
        }

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => {
                    tracing::info!("scheduler shutting down");
                    return;
                }
            }

            let now = clock();
            for entry in self.due(&now) {
                tracing::info!(entry = %entry, "triggering scheduled stream start");
                on_fire(entry);
            }
        }
    }
}
