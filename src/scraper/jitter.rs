use rand::Rng;
use std::time::Duration;
use tracing::debug;

use crate::config::DelayRange;

/// Random pause between browser actions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jitter {
    min: Duration,
    max: Duration,
}

impl Jitter {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }

    pub async fn pause(&self) {
        let wait = self.sample();
        if wait.is_zero() {
            return;
        }
        debug!("Waiting {:?}", wait);
        tokio::time::sleep(wait).await;
    }
}

impl From<DelayRange> for Jitter {
    fn from(range: DelayRange) -> Self {
        Self::new(range.min, range.max)
    }
}
