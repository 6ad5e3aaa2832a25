//! Redis-backed implementation of [`crate::client`]'s store contract.
//!
//! This is the reference target (§1, §6): BullMQ's layout lives on top of
//! plain Redis data structures, so the command connection is a thin
//! wrapper over `redis`'s multiplexed async connection, and the subscriber
//! connection wraps `redis`'s `PubSub` type.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use redis::aio::{MultiplexedConnection, PubSub};
use redis::AsyncCommands;

use tracing::debug;

use crate::client::{BrokerStore, CommandClient, KeyspaceMessage, ScanBatch, SubscriberClient, ZMember};
use crate::error::StoreError;

/// Number of keys requested per `SCAN` round-trip. Purely a batching knob;
/// does not change the cursor protocol's completion semantics.
const SCAN_COUNT: usize = 200;

/// Opens connections against a live Redis server.
#[derive(Clone, Debug, Default)]
pub struct RedisStore;

impl RedisStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrokerStore for RedisStore {
    async fn open_command(&self, endpoint: &str) -> Result<Arc<dyn CommandClient>, StoreError> {
        let client = redis::Client::open(endpoint)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        debug!("opened command connection");
        Ok(Arc::new(RedisCommandClient { conn }))
    }

    async fn open_subscriber(
        &self,
        endpoint: &str,
    ) -> Result<Box<dyn SubscriberClient>, StoreError> {
        let client = redis::Client::open(endpoint)?;
        let pubsub = client.get_async_pubsub().await?;
        debug!("opened subscriber connection");
        Ok(Box::new(RedisSubscriberClient {
            state: SubscriberState::Idle(pubsub),
        }))
    }
}

/// Command-connection handle. `MultiplexedConnection` is cheaply `Clone`
/// (it wraps a channel to a background I/O task), so every call clones it
/// rather than serializing access behind a lock.
pub struct RedisCommandClient {
    conn: MultiplexedConnection,
}

impl RedisCommandClient {
    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

#[async_trait]
impl CommandClient for RedisCommandClient {
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        self.conn()
            .lrange(key, start as isize, stop as isize)
            .await
            .map_err(StoreError::Command)
    }

    async fn llen(&self, key: &str) -> Result<u64, StoreError> {
        self.conn().llen(key).await.map_err(StoreError::Command)
    }

    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ZMember>, StoreError> {
        let raw: Vec<(String, f64)> = self
            .conn()
            .zrevrange_withscores(key, start as isize, stop as isize)
            .await
            .map_err(StoreError::Command)?;
        Ok(raw
            .into_iter()
            .map(|(member, score)| ZMember { member, score })
            .collect())
    }

    async fn zrange_withscores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ZMember>, StoreError> {
        let raw: Vec<(String, f64)> = self
            .conn()
            .zrange_withscores(key, start as isize, stop as isize)
            .await
            .map_err(StoreError::Command)?;
        Ok(raw
            .into_iter()
            .map(|(member, score)| ZMember { member, score })
            .collect())
    }

    async fn zcard(&self, key: &str) -> Result<u64, StoreError> {
        self.conn().zcard(key).await.map_err(StoreError::Command)
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError> {
        self.conn()
            .zscore(key, member)
            .await
            .map_err(StoreError::Command)
    }

    async fn lpos(&self, key: &str, member: &str) -> Result<Option<i64>, StoreError> {
        self.conn()
            .lpos(key, member, redis::LposOptions::default())
            .await
            .map_err(StoreError::Command)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.conn()
            .hgetall(key)
            .await
            .map_err(StoreError::Command)
    }

    async fn scan_match(&self, cursor: u64, pattern: &str) -> Result<ScanBatch, StoreError> {
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_COUNT)
            .query_async(&mut self.conn())
            .await
            .map_err(StoreError::Command)?;
        Ok(ScanBatch { next_cursor, keys })
    }

    async fn close(&self) -> Result<(), StoreError> {
        // `MultiplexedConnection` has no explicit close handshake; the
        // background I/O task and its socket are released when the last
        // clone is dropped. The caller (broker-adapter's lifecycle module)
        // drops its `Arc<dyn CommandClient>` immediately after this returns.
        Ok(())
    }
}

enum SubscriberState {
    Idle(PubSub),
    Streaming(Pin<Box<dyn Stream<Item = redis::Msg> + Send>>),
    Closed,
}

/// Subscriber-connection handle.
///
/// `redis::aio::PubSub::into_on_message` consumes the connection to produce
/// an owned message stream, so subscribing is a one-way transition from
/// `Idle` to `Streaming`: this client supports exactly the single
/// `psubscribe` call the adapter core needs (§4.3 "single pattern"), not
/// arbitrary resubscription.
pub struct RedisSubscriberClient {
    state: SubscriberState,
}

#[async_trait]
impl SubscriberClient for RedisSubscriberClient {
    async fn psubscribe(&mut self, pattern: &str) -> Result<(), StoreError> {
        let SubscriberState::Idle(mut pubsub) =
            std::mem::replace(&mut self.state, SubscriberState::Closed)
        else {
            self.state = SubscriberState::Closed;
            return Err(StoreError::NotSubscribed);
        };
        pubsub.psubscribe(pattern).await?;
        self.state = SubscriberState::Streaming(Box::pin(pubsub.into_on_message()));
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<KeyspaceMessage>, StoreError> {
        match &mut self.state {
            SubscriberState::Streaming(stream) => Ok(stream.next().await.map(|msg| {
                let op: String = msg.get_payload().unwrap_or_default();
                KeyspaceMessage {
                    channel: msg.get_channel_name().to_string(),
                    op,
                }
            })),
            _ => Err(StoreError::NotSubscribed),
        }
    }

    async fn unsubscribe_all(&mut self) -> Result<(), StoreError> {
        // The owned message stream gives up direct protocol access; the
        // only way to stop delivery is to drop the connection outright,
        // which is also a valid reading of "unsubscribe" for a
        // single-pattern subscriber.
        self.state = SubscriberState::Closed;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.state = SubscriberState::Closed;
        Ok(())
    }
}
