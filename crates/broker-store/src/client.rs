//! Broker-agnostic store client contract (component B, §4.2).
//!
//! `broker-adapter` talks to the broker exclusively through these traits, so
//! a different broker implementation only needs to provide a
//! [`BrokerStore`]/[`CommandClient`]/[`SubscriberClient`] trio to be plugged
//! underneath the same `Adapter Core` logic.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;

/// One member of an ordered-set range read, with its score.
#[derive(Clone, Debug, PartialEq)]
pub struct ZMember {
    pub member: String,
    pub score: f64,
}

/// One page of a cursor scan. `next_cursor == 0` means the scan has
/// returned to the start sentinel and the caller should stop iterating.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanBatch {
    pub next_cursor: u64,
    pub keys: Vec<String>,
}

/// A single keyspace mutation notification delivered on the subscriber
/// connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyspaceMessage {
    pub channel: String,
    /// The mutation verb (`hset`, `lpush`, `zadd`, `del`, ...).
    pub op: String,
}

/// Low-level operations available on the command connection.
///
/// Contract: every operation reports failure through `Result`; there is no
/// ambient exception propagation and no silent retry (one send, one
/// outcome — §4.2).
#[async_trait]
pub trait CommandClient: Send + Sync {
    /// Ordered range-read of a list by `[start, stop]` indices (inclusive).
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError>;

    /// Cardinality of a list.
    async fn llen(&self, key: &str) -> Result<u64, StoreError>;

    /// Ordered-set range read, descending by score, with scores attached.
    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ZMember>, StoreError>;

    /// Ordered-set range read, ascending by score, with scores attached.
    async fn zrange_withscores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ZMember>, StoreError>;

    /// Cardinality of an ordered set.
    async fn zcard(&self, key: &str) -> Result<u64, StoreError>;

    /// Score-of-member probe; `None` when `member` is absent from the set.
    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError>;

    /// Position-of-member probe in a list; `None` when `member` is absent.
    async fn lpos(&self, key: &str, member: &str) -> Result<Option<i64>, StoreError>;

    /// Reads every field of a hash record. Returns an empty map when the key
    /// does not exist (the caller distinguishes "absent" from "empty" using
    /// other signals, per the §4.3 tombstone-race handling).
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// One page of a cursor scan over keys matching `pattern`. Callers loop
    /// starting at `cursor = 0` until a returned batch's `next_cursor == 0`.
    async fn scan_match(&self, cursor: u64, pattern: &str) -> Result<ScanBatch, StoreError>;

    /// Attempts a clean shutdown that drains in-flight requests; on failure
    /// the caller should treat the connection as already gone.
    async fn close(&self) -> Result<(), StoreError>;
}

/// Operations available on the subscriber connection.
///
/// A single subscriber handle is shared by every registered listener
/// (§4.3, §9 "Subscriber multiplexing") — this trait is therefore `&mut
/// self`, not `&self`: the adapter core owns the one subscriber instance
/// and never hands out concurrent mutable access to it.
#[async_trait]
pub trait SubscriberClient: Send + Sync {
    /// Subscribes to a single glob pattern.
    async fn psubscribe(&mut self, pattern: &str) -> Result<(), StoreError>;

    /// Awaits the next `(channel, op)` tuple. Returns `None` when the
    /// subscriber has been closed and no further messages will arrive.
    async fn recv(&mut self) -> Result<Option<KeyspaceMessage>, StoreError>;

    /// Unsubscribes from every pattern this handle is currently subscribed
    /// to. Idempotent.
    async fn unsubscribe_all(&mut self) -> Result<(), StoreError>;

    /// Attempts a clean shutdown, falling back to a forced close on failure.
    /// Idempotent.
    async fn close(&mut self) -> Result<(), StoreError>;
}

/// Opens connections against a broker endpoint.
///
/// Both connections are independent: `open_command` and `open_subscriber`
/// each dial a fresh connection, matching §4.2's "two pooled broker
/// connections".
#[async_trait]
pub trait BrokerStore: Send + Sync {
    async fn open_command(&self, endpoint: &str) -> Result<Arc<dyn CommandClient>, StoreError>;

    async fn open_subscriber(
        &self,
        endpoint: &str,
    ) -> Result<Box<dyn SubscriberClient>, StoreError>;
}
