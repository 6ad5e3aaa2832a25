use thiserror::Error;

/// Errors from the low-level broker transport layer.
///
/// `broker-adapter` maps these onto `AdapterError::{Transport, Cancelled,
/// Internal}` at the contract boundary; nothing below this crate retries
/// silently (§4.2: one send, one outcome).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("broker connection failed: {0}")]
    Connect(#[from] redis::RedisError),

    #[error("broker command failed: {0}")]
    Command(redis::RedisError),

    #[error("operation cancelled before completion")]
    Cancelled,

    #[error("subscriber connection was not established")]
    NotSubscribed,
}
