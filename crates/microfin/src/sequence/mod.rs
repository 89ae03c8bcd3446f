//! Durable named counters backing every display identifier.

mod file;
mod memory;

pub use file::FileSequenceStore;
pub use memory::InMemorySequenceStore;

/// Failure raised by a sequence backend.
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("sequence store unavailable: {0}")]
    Unavailable(String),
    #[error("sequence {name} exhausted")]
    Exhausted { name: String },
}

/// Issues unique, strictly increasing integers per counter name.
///
/// `next` must be a single indivisible find-and-increment against the backing store. An
/// absent counter starts at 0, so its first issued value is 1. Implementations never retry
/// internally: a lost acknowledgement could otherwise double-issue.
pub trait SequenceStore: Send + Sync {
    fn next(&self, name: &str) -> Result<u64, SequenceError>;

    /// Last issued value, or 0 when the counter has never been used.
    fn current(&self, name: &str) -> Result<u64, SequenceError>;

    /// Maintenance only. Never call from request-serving code.
    fn reset_to(&self, name: &str, value: u64) -> Result<(), SequenceError>;
}
