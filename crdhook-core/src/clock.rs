//! Injectable sources of time and identifiers.
//!
//! Hook-instance ids, coverage-assertion ids and the end of the occurrence
//! window have no business rule behind them yet, so each comes from a trait
//! object the caller can pin.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{CoreError, Result};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// `<prefix>-1`, `<prefix>-2`, ...
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.prefix, n)
    }
}

/// How long after its start an order's occurrence window ends.
///
/// `None` when the length does not fit in a `Duration`.
pub trait OccurrencePolicy: Send + Sync {
    fn window_length(&self) -> Option<Duration>;
}

/// A whole number of days drawn uniformly from `min_days..=max_days`.
#[derive(Debug, Clone, Copy)]
pub struct RandomDayOffset {
    pub min_days: u32,
    pub max_days: u32,
}

impl Default for RandomDayOffset {
    fn default() -> Self {
        Self {
            min_days: 1,
            max_days: 5,
        }
    }
}

impl OccurrencePolicy for RandomDayOffset {
    fn window_length(&self) -> Option<Duration> {
        let (low, high) = if self.min_days <= self.max_days {
            (self.min_days, self.max_days)
        } else {
            (self.max_days, self.min_days)
        };
        let days = rand::thread_rng().gen_range(low..=high);
        Duration::try_days(i64::from(days))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedDayOffset(pub u32);

impl OccurrencePolicy for FixedDayOffset {
    fn window_length(&self) -> Option<Duration> {
        Duration::try_days(i64::from(self.0))
    }
}

/// Start and end of a ServiceRequest's `occurrencePeriod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccurrencePeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl OccurrencePeriod {
    pub fn starting_now(clock: &dyn Clock, policy: &dyn OccurrencePolicy) -> Result<Self> {
        let start = clock.now();
        let end = policy
            .window_length()
            .and_then(|length| start.checked_add_signed(length))
            .ok_or_else(|| {
                CoreError::OccurrenceOutOfRange(format!(
                    "occurrence window starting {} ends past the representable date range",
                    start
                ))
            })?;
        Ok(Self { start, end })
    }
}
