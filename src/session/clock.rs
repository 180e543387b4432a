/// Wall-clock source for session validity checks
pub trait Clock: Send + Sync {
    /// Current time in epoch seconds
    fn now_secs(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}
