//! Adapter Core: the broker-agnostic read path over a [`broker_store::BrokerStore`]
//! (§2, component C).

pub mod adapter;
mod config;
mod decode;
mod discover;
mod events;
mod fetch_job;
mod lifecycle;
mod list_jobs;
mod metrics;

#[cfg(test)]
mod test_support;

pub use adapter::RedisBrokerAdapter;
pub use config::AdapterConfig;
