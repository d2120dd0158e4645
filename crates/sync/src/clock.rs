use chrono::{DateTime, Utc};

/// Time source injected into every time-dependent component so that tests
/// control the clock instead of patching globals.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
