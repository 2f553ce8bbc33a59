use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;

/// Source of server time. Every cooldown and accrual reads time through this trait.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current unix time in seconds.
    fn unix(&self) -> i64 {
        self.now().timestamp()
    }

    /// Current calendar date in server time (UTC).
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Weekday index with Monday = 0.
    fn weekday(&self) -> u32 {
        self.now().weekday().num_days_from_monday()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(unix_secs: i64) -> Self {
        let now = Utc.timestamp_opt(unix_secs, 0).single().unwrap_or_else(Utc::now);
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, unix_secs: i64) {
        if let Some(ts) = Utc.timestamp_opt(unix_secs, 0).single() {
            *self.now.lock() = ts;
        }
    }

    pub fn advance(&self, secs: i64) {
        let mut now = self.now.lock();
        *now += chrono::Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
