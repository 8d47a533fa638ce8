use std::fmt::Debug;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    #[error("system clock is before the Unix epoch: {0}")]
    BeforeEpoch(#[from] std::time::SystemTimeError),
    #[error("clock unavailable: {0}")]
    Unavailable(String),
}

/// 时间来源，注册与清理都通过它读取当前时间
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> Result<SystemTime, ClockError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<SystemTime, ClockError> {
        let now = SystemTime::now();
        now.duration_since(UNIX_EPOCH)?;
        Ok(now)
    }
}

/// 手动推进的时钟，用于在测试中模拟时间流逝
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: SystemTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Result<SystemTime, ClockError> {
        self.now
            .lock()
            .map(|now| *now)
            .map_err(|_| ClockError::Unavailable("manual clock poisoned".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let start = UNIX_EPOCH + Duration::from_secs(100);
        let clock = ManualClock::new(start);
        clock.advance(Duration::from_micros(1));
        assert_eq!(clock.now().unwrap(), start + Duration::from_micros(1));
        clock.set(start);
        assert_eq!(clock.now().unwrap(), start);
    }

    #[test]
    fn system_clock_reads() {
        assert!(SystemClock.now().is_ok());
    }
}
