// 📅 Periods & Clocks
// A period is one calendar month ("YYYY-MM"), the reset boundary for
// sending allowances.
//
// The ledger never reads the wall clock directly; it asks a Clock, so a
// test can move time forward a month and watch the lazy reset happen.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use crate::error::LedgerError;

// ============================================================================
// PERIOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, LedgerError> {
        if !(1..=12).contains(&month) {
            return Err(LedgerError::Validation(format!(
                "month must be between 1 and 12, got {}",
                month
            )));
        }
        if !(0..=9999).contains(&year) {
            return Err(LedgerError::Validation(format!(
                "year must be between 0 and 9999, got {}",
                year
            )));
        }
        Ok(Period { year, month })
    }

    /// Period containing the given instant (UTC)
    pub fn containing(time: DateTime<Utc>) -> Self {
        Period {
            year: time.year(),
            month: time.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The calendar month after this one
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Period {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Period {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::Validation(format!("invalid period '{}', expected YYYY-MM", s));

        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let digits =
            |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(year, 4) || !digits(month, 2) {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;

        Period::new(year, month)
    }
}

impl TryFrom<String> for Period {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

// ============================================================================
// CLOCKS
// ============================================================================

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn current_period(&self) -> Period {
        Period::containing(self.now())
    }
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        ManualClock {
            now: RwLock::new(now),
        }
    }

    /// Clock pinned to the first day of the given period
    pub fn at_period(period: Period) -> Self {
        let start = Utc
            .with_ymd_and_hms(period.year(), period.month(), 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        ManualClock::new(start)
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.write() {
            *guard += by;
        }
    }

    /// Jump to the first day of the next calendar month
    pub fn advance_month(&self) {
        let next = self.current_period().next();
        if let Some(start) = Utc
            .with_ymd_and_hms(next.year(), next.month(), 1, 12, 0, 0)
            .single()
        {
            self.set(start);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
