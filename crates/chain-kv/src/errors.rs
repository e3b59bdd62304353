use thiserror::Error;

/// Failures surfaced by a [`crate::KeyValueStore`] implementation.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("lock poisoned")]
    LockPoisoned,
}
