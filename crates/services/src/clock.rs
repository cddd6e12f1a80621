use std::time::Duration;

use bson::DateTime;
use chrono::Utc;
use parking_lot::Mutex;

/// Source of "now" for the chat policy windows.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime {
        DateTime::from_chrono(Utc::now())
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime>,
}

impl ManualClock {
    pub fn new(start: DateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime) {
        *self.now.lock() = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = shift_forward(*now, by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime {
        *self.now.lock()
    }
}

pub fn shift_forward(at: DateTime, by: Duration) -> DateTime {
    DateTime::from_millis(at.timestamp_millis().saturating_add(millis(by)))
}

pub fn shift_back(at: DateTime, by: Duration) -> DateTime {
    DateTime::from_millis(at.timestamp_millis().saturating_sub(millis(by)))
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
