//! The concrete [`BrokerAdapter`] implementation, gluing the lifecycle,
//! discovery, listing, fetch, metrics, and event-translation modules to a
//! [`BrokerStore`] (§2 "Adapter Core").

use std::sync::Arc;

use async_trait::async_trait;
use broker_store::{keyspace_pattern, BrokerStore};
use broker_types::{
    AdapterError, AdapterResult, BrokerAdapter, Job, JobEventListener, ListJobsQuery, Metrics,
    Queue, Unregister,
};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AdapterConfig;
use crate::events::{run_delivery_loop, ListenerRegistry};
use crate::lifecycle::{parse_endpoint, Connected, Subscription};
use crate::{discover, fetch_job, list_jobs, metrics};

/// Broker-agnostic adapter core, parameterized over a [`BrokerStore`].
///
/// Despite the name, this type is not tied to Redis specifically — it only
/// depends on the `broker-store` trait trio. The `Redis` prefix names the
/// reference target (§1) the default configuration assumes.
pub struct RedisBrokerAdapter {
    store: Arc<dyn BrokerStore>,
    config: AdapterConfig,
    state: RwLock<Option<Connected>>,
}

impl RedisBrokerAdapter {
    pub fn new(store: Arc<dyn BrokerStore>, config: AdapterConfig) -> Self {
        Self {
            store,
            config,
            state: RwLock::new(None),
        }
    }

    async fn teardown(connected: Connected) -> AdapterResult<()> {
        if let Some(subscription) = connected.subscription {
            subscription.cancel.cancel();
            if let Err(e) = subscription.task.await {
                warn!(error = %e, "subscriber delivery task panicked during teardown");
            }
        }
        connected
            .command
            .close()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))
    }
}

#[async_trait]
impl BrokerAdapter for RedisBrokerAdapter {
    async fn connect(&self, endpoint: &str) -> AdapterResult<()> {
        let parsed = parse_endpoint(endpoint)?;
        let mut guard = self.state.write().await;

        if let Some(previous) = guard.take() {
            // Reconnecting while already connected: tear down the old
            // connection first rather than leaking it.
            Self::teardown(previous).await?;
        }

        let connect = self.store.open_command(endpoint);
        let command = match tokio::time::timeout(self.config.connect_timeout_value(), connect).await {
            Ok(Ok(command)) => command,
            Ok(Err(e)) => return Err(AdapterError::Transport(e.to_string())),
            Err(_elapsed) => {
                return Err(AdapterError::Transport(
                    "connect timed out waiting for ready/error".to_string(),
                ))
            }
        };

        info!(host = %parsed.host, port = parsed.port, db = parsed.db_index, "connected to broker");
        *guard = Some(Connected {
            command,
            descriptor: broker_types::ConnectionDescriptor {
                host: parsed.host,
                port: parsed.port,
                db_index: parsed.db_index,
            },
            db_index: parsed.db_index,
            raw_endpoint: endpoint.to_string(),
            subscription: None,
        });
        Ok(())
    }

    async fn disconnect(&self) -> AdapterResult<()> {
        let mut guard = self.state.write().await;
        let Some(connected) = guard.take() else {
            // Idempotent: repeated calls after success are no-ops (§4.3).
            return Ok(());
        };
        Self::teardown(connected).await
    }

    async fn discover(&self, cancel: Option<&CancellationToken>) -> AdapterResult<Vec<Queue>> {
        let guard = self.state.read().await;
        let connected = guard.as_ref().ok_or(AdapterError::NotConnected)?;
        discover::discover(
            connected.command.as_ref(),
            self.config.prefix_str(),
            &connected.descriptor,
            cancel,
        )
        .await
    }

    async fn list_jobs(
        &self,
        query: ListJobsQuery,
        cancel: Option<&CancellationToken>,
    ) -> AdapterResult<Vec<Job>> {
        let guard = self.state.read().await;
        let connected = guard.as_ref().ok_or(AdapterError::NotConnected)?;
        list_jobs::list_jobs(connected.command.as_ref(), self.config.prefix_str(), &query, cancel)
            .await
    }

    async fn fetch_job(&self, queue: &str, id: &str) -> AdapterResult<Job> {
        let guard = self.state.read().await;
        let connected = guard.as_ref().ok_or(AdapterError::NotConnected)?;
        fetch_job::fetch_job(connected.command.as_ref(), self.config.prefix_str(), queue, id).await
    }

    async fn metrics(&self, queue: &str) -> AdapterResult<Metrics> {
        let guard = self.state.read().await;
        let connected = guard.as_ref().ok_or(AdapterError::NotConnected)?;
        metrics::metrics(
            connected.command.as_ref(),
            self.config.prefix_str(),
            queue,
            self.config.metrics_sample_horizon_value(),
        )
        .await
    }

    async fn subscribe(&self, listener: JobEventListener) -> AdapterResult<Unregister> {
        let mut guard = self.state.write().await;
        let connected = guard.as_mut().ok_or(AdapterError::NotConnected)?;

        if connected.subscription.is_none() {
            let mut subscriber = self
                .store
                .open_subscriber(&connected.raw_endpoint)
                .await
                .map_err(|e| AdapterError::Transport(e.to_string()))?;
            let pattern = keyspace_pattern(self.config.prefix_str(), connected.db_index);
            subscriber
                .psubscribe(&pattern)
                .await
                .map_err(|e| AdapterError::Transport(e.to_string()))?;

            let registry = Arc::new(ListenerRegistry::new());
            let cancel = CancellationToken::new();
            let task = tokio::spawn(run_delivery_loop(
                subscriber,
                registry.clone(),
                self.config.prefix_str().to_string(),
                connected.db_index,
                cancel.clone(),
            ));
            connected.subscription = Some(Subscription { registry, cancel, task });
        }

        // Multi-listener fan-out model (§9 "Subscriber multiplexing"): one
        // subscription is shared by every registered listener, so this
        // adapter never returns `AlreadySubscribed` — see DESIGN.md.
        let subscription = connected.subscription.as_ref().expect("just ensured above");
        let registry = subscription.registry.clone();
        let id = registry.add(listener);
        Ok(Unregister::new(move || registry.remove(id)))
    }
}
