//! Remaining-time computation and the periodic refresh that keeps every
//! loaded task's countdown current.

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::task::Task;

pub const EXPIRED_TEXT: &str = "Time's up!";
pub const INVALID_TEXT: &str = "Invalid deadline";
pub const PENDING_TEXT: &str = "Calculating...";

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

/// Layouts a datetime picker or a hand-typed deadline may use. Interpreted in
/// local time.
const LOCAL_LAYOUTS: [&str; 5] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    Remaining { hours: i64, minutes: i64, seconds: i64 },
    Expired,
    Invalid,
}

impl Countdown {
    pub fn between(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let difference = (deadline - now).num_milliseconds();
        if difference <= 0 {
            return Countdown::Expired;
        }
        Countdown::Remaining {
            hours: difference / MS_PER_HOUR,
            minutes: (difference % MS_PER_HOUR) / MS_PER_MINUTE,
            seconds: (difference % MS_PER_MINUTE) / MS_PER_SECOND,
        }
    }

    pub fn for_deadline(deadline: &str, now: DateTime<Utc>) -> Self {
        match parse_deadline(deadline) {
            Some(at) => Countdown::between(at, now),
            None => Countdown::Invalid,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Countdown::Expired)
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Countdown::Remaining {
                hours,
                minutes,
                seconds,
            } => write!(f, "{}h {}m {}s", hours, minutes, seconds),
            Countdown::Expired => f.write_str(EXPIRED_TEXT),
            Countdown::Invalid => f.write_str(INVALID_TEXT),
        }
    }
}

pub fn remaining_time(deadline: &str, now: DateTime<Utc>) -> String {
    Countdown::for_deadline(deadline, now).to_string()
}

/// RFC 3339 keeps its own offset, naive datetimes are local, and a bare date
/// is midnight UTC.
pub fn parse_deadline(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    for layout in LOCAL_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return resolve_local(naive, |n| Local.from_local_datetime(n));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Earliest instant for an ambiguous wall time. A wall time skipped by a
/// spring-forward gap moves forward by the gap's hour.
fn resolve_local<Tz: TimeZone>(
    naive: NaiveDateTime,
    resolve: impl Fn(&NaiveDateTime) -> LocalResult<DateTime<Tz>>,
) -> Option<DateTime<Utc>> {
    resolve(&naive)
        .earliest()
        .or_else(|| resolve(&(naive + chrono::Duration::hours(1))).earliest())
        .map(|at| at.with_timezone(&Utc))
}

pub type CountdownMap = HashMap<String, Countdown>;

pub fn compute_countdowns(tasks: &[Task], now: DateTime<Utc>) -> CountdownMap {
    tasks
        .iter()
        .map(|t| (t.id.clone(), Countdown::for_deadline(&t.deadline, now)))
        .collect()
}

/// Owned periodic refresh. Each tick replaces the whole map. Dropping the
/// handle stops the timer.
pub struct CountdownTicker {
    handle: JoinHandle<()>,
    countdowns: watch::Receiver<CountdownMap>,
}

impl CountdownTicker {
    pub fn start(tasks: watch::Receiver<Vec<Task>>, period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let (tx, countdowns) = watch::channel(CountdownMap::new());
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let map = compute_countdowns(&tasks.borrow(), Utc::now());
                if tx.send(map).is_err() {
                    break;
                }
            }
        });
        tracing::debug!(target: "todolist.countdown", period_ms = period.as_millis() as u64, "ticker started");
        Self { handle, countdowns }
    }

    pub fn subscribe(&self) -> watch::Receiver<CountdownMap> {
        self.countdowns.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::debug!(target: "todolist.countdown", "ticker stopped");
    }
}
