// Progress logging that cannot flood the log on large inputs

use std::time::{Duration, Instant};
use tracing::info;

/// Emits at most one message per `interval`
#[derive(Debug)]
pub struct ProgressLog {
    interval: Duration,
    last: Instant,
}

impl ProgressLog {
    pub fn new(interval: Duration) -> Self {
        ProgressLog {
            interval,
            last: Instant::now(),
        }
    }

    /// Log `message()` if the interval has passed since the last emission.
    /// The message is only built when it is actually logged.
    pub fn tick<F>(&mut self, message: F) -> bool
    where
        F: FnOnce() -> String,
    {
        if self.last.elapsed() < self.interval {
            return false;
        }

        info!("{}", message());
        self.last = Instant::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_always_logs() {
        let mut progress = ProgressLog::new(Duration::ZERO);
        assert!(progress.tick(|| "one".to_string()));
        assert!(progress.tick(|| "two".to_string()));
    }

    #[test]
    fn test_long_interval_suppresses_messages() {
        let mut progress = ProgressLog::new(Duration::from_secs(3600));
        let mut built = 0;

        for _ in 0..1000 {
            progress.tick(|| {
                built += 1;
                "never".to_string()
            });
        }

        assert_eq!(built, 0);
    }

    #[test]
    fn test_logs_again_after_interval() {
        let mut progress = ProgressLog::new(Duration::from_millis(200));
        assert!(!progress.tick(|| "too soon".to_string()));

        std::thread::sleep(Duration::from_millis(250));
        assert!(progress.tick(|| "now".to_string()));
        assert!(!progress.tick(|| "too soon again".to_string()));
    }
}
