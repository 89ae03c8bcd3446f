use std::thread;
use std::time::Duration;

use super::error::RepositoryError;

/// Backoff applied to read operations that hit an unavailable store.
///
/// Writes never go through this: a write whose acknowledgement was lost may already have
/// committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for ReadRetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

impl ReadRetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub fn run<T>(
        &self,
        mut read: impl FnMut() -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let attempts = self.attempts.max(1);
        let mut delay = self.backoff;
        let mut attempt = 1;
        loop {
            match read() {
                Err(RepositoryError::Unavailable(detail)) if attempt < attempts => {
                    tracing::debug!(attempt, %detail, "store read failed, backing off");
                    thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
