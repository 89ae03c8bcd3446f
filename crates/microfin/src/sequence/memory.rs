use std::collections::HashMap;
use std::sync::Mutex;

use super::{SequenceError, SequenceStore};

/// Process-local counters. The whole upsert-and-increment happens under one lock.
#[derive(Debug, Default)]
pub struct InMemorySequenceStore {
    counters: Mutex<HashMap<String, u64>>,
}

impl InMemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, u64>>, SequenceError> {
        self.counters
            .lock()
            .map_err(|_| SequenceError::Unavailable("counter lock poisoned".to_string()))
    }
}

impl SequenceStore for InMemorySequenceStore {
    fn next(&self, name: &str) -> Result<u64, SequenceError> {
        let mut counters = self.lock()?;
        let value = counters.entry(name.to_string()).or_insert(0);
        *value = value.checked_add(1).ok_or_else(|| SequenceError::Exhausted {
            name: name.to_string(),
        })?;
        Ok(*value)
    }

    fn current(&self, name: &str) -> Result<u64, SequenceError> {
        Ok(self.lock()?.get(name).copied().unwrap_or(0))
    }

    fn reset_to(&self, name: &str, value: u64) -> Result<(), SequenceError> {
        self.lock()?.insert(name.to_string(), value);
        Ok(())
    }
}
