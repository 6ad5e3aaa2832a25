//! Key layout and store client contract for a broker-backed queue, plus a
//! Redis implementation of that contract (reference target: BullMQ).

pub mod client;
pub mod error;
pub mod keys;
pub mod redis_client;

pub use client::{BrokerStore, CommandClient, KeyspaceMessage, ScanBatch, SubscriberClient, ZMember};
pub use error::StoreError;
pub use keys::{
    is_reserved_suffix, job_key, keyspace_pattern, meta_key, meta_key_pattern, parse_key,
    parse_keyspace_channel, status_key, ParsedKey, StatusIndex, RESERVED_SUFFIXES,
};
pub use redis_client::RedisStore;
