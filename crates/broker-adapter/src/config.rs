use std::time::Duration;

/// Tunables for a [`crate::adapter::RedisBrokerAdapter`].
///
/// All fields have defaults matching the reference broker (BullMQ-on-Redis);
/// override only what a deployment actually needs to change.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Broker key prefix. BullMQ defaults to `bull`.
    prefix: String,
    /// Maximum number of completed/failed members inspected by `Metrics`.
    metrics_sample_horizon: u32,
    /// Upper bound on how long `Connect` waits for the first ready/error.
    connect_timeout: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            prefix: "bull".to_string(),
            metrics_sample_horizon: 100,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl AdapterConfig {
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn metrics_sample_horizon(mut self, n: u32) -> Self {
        self.metrics_sample_horizon = n;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn prefix_str(&self) -> &str {
        &self.prefix
    }

    pub fn metrics_sample_horizon_value(&self) -> u32 {
        self.metrics_sample_horizon
    }

    pub fn connect_timeout_value(&self) -> Duration {
        self.connect_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_broker() {
        let config = AdapterConfig::default();
        assert_eq!(config.prefix_str(), "bull");
        assert_eq!(config.metrics_sample_horizon_value(), 100);
        assert_eq!(config.connect_timeout_value(), Duration::from_secs(10));
    }

    #[test]
    fn builder_overrides_apply() {
        let config = AdapterConfig::default()
            .prefix("custom")
            .metrics_sample_horizon(50)
            .connect_timeout(Duration::from_secs(2));
        assert_eq!(config.prefix_str(), "custom");
        assert_eq!(config.metrics_sample_horizon_value(), 50);
        assert_eq!(config.connect_timeout_value(), Duration::from_secs(2));
    }
}
