use std::time::Duration;

/// Default cap on a single inbound message
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

/// Default period of [`Bridge::run_sweeper`](crate::Bridge::run_sweeper)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest sweep period the builder accepts; shorter values are raised to it
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pending_ttl: Option<Duration>,
    sweep_interval: Duration,
    max_message_len: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            pending_ttl: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

impl BridgeConfig {
    /// Create a new builder for BridgeConfig
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// How long a request may wait before a sweep evicts it; `None` keeps it forever
    pub fn pending_ttl(&self) -> Option<Duration> {
        self.pending_ttl
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    pub fn max_message_len(&self) -> usize {
        self.max_message_len
    }
}

/// Builder for BridgeConfig
#[derive(Debug, Default)]
pub struct BridgeConfigBuilder {
    inner: BridgeConfig,
}

impl BridgeConfigBuilder {
    pub fn pending_ttl(mut self, ttl: Duration) -> Self {
        self.inner.pending_ttl = Some(ttl);
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.inner.sweep_interval = interval.max(MIN_SWEEP_INTERVAL);
        self
    }

    pub fn max_message_len(mut self, len: usize) -> Self {
        self.inner.max_message_len = len;
        self
    }

    pub fn build(self) -> BridgeConfig {
        self.inner
    }
}
