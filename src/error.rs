//! Failure types for the two boundaries the lookup core talks to.
//!
//! Neither error ever reaches a reader: the cache and the orchestrator absorb
//! them and fall back to "not found" or "no-op". They exist so the failure
//! paths stay observable in logs, in [`crate::Resolution::failures`], and in tests.

use thiserror::Error;

/// A backend dictionary or lemmatiser request that did not produce a usable answer.
#[derive(Error, Debug)]
pub enum LookupError {
    /// The request never completed (connect, timeout, body read).
    #[error("transport error calling {endpoint}: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status other than "not found".
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },

    /// The service answered 2xx but the payload was not what we expected.
    #[error("invalid payload from {endpoint}: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },
}

/// A read or write of the durable cache slot that failed.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize cache payload: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The slot exists but does not hold a cache payload.
    #[error("cache slot {slot:?} is corrupt: {message}")]
    Corrupt { slot: String, message: String },
}
