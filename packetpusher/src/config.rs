// config.rs - Endpoint and test-run configuration
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_PACKET_COUNT: u32 = 10_000_000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 50_000;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_RECV_BUDGET: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidAddress(String),
    InvalidPort,
    InvalidWorkerCount,
    UnboundedTest,
    InvalidQueueCapacity,
    InvalidPollInterval,
    InvalidRecvBudget,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidAddress(addr) => write!(f, "Invalid address: {}", addr),
            ConfigError::InvalidPort => write!(f, "Port must be non-zero"),
            ConfigError::InvalidWorkerCount => write!(f, "At least one worker is required"),
            ConfigError::UnboundedTest => {
                write!(f, "Either a packet count or a timeout must bound the test")
            }
            ConfigError::InvalidQueueCapacity => write!(f, "Queue capacity must be non-zero"),
            ConfigError::InvalidPollInterval => write!(f, "Poll interval must be non-zero"),
            ConfigError::InvalidRecvBudget => write!(f, "Receive budget must be non-zero"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Resolves a host name or IP literal plus port into the first usable address.
pub fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    if port == 0 {
        return Err(ConfigError::InvalidPort);
    }
    (host, port)
        .to_socket_addrs()
        .map_err(|_| ConfigError::InvalidAddress(format!("{}:{}", host, port)))?
        .next()
        .ok_or_else(|| ConfigError::InvalidAddress(format!("{}:{}", host, port)))
}

/// Available parallelism minus one, never less than one.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Tuning for a single endpoint's buffering and I/O loop.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    /// Queue length beyond which `send` blocks until the I/O loop drains.
    pub queue_capacity: usize,
    /// Upper bound on how long the I/O loop waits for readiness; also bounds
    /// how late a `stop` can be noticed.
    pub poll_interval: Duration,
    /// Period of the server status report.
    pub status_interval: Duration,
    /// Datagrams read per loop iteration before the loop services the queue.
    pub recv_budget: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            status_interval: DEFAULT_STATUS_INTERVAL,
            recv_budget: DEFAULT_RECV_BUDGET,
        }
    }
}

impl EndpointConfig {
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    pub fn with_recv_budget(mut self, budget: usize) -> Self {
        self.recv_budget = budget;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval);
        }
        if self.recv_budget == 0 {
            return Err(ConfigError::InvalidRecvBudget);
        }
        Ok(())
    }
}

/// Parameters of one client-side test: every worker pushes at `remote` with
/// the same bounds. A zero `packet_count` or zero `timeout` means that bound
/// is unused.
#[derive(Debug, Clone, PartialEq)]
pub struct TestConfig {
    pub remote: SocketAddr,
    pub workers: usize,
    pub packet_count: u32,
    pub timeout: Duration,
    pub endpoint: EndpointConfig,
}

impl TestConfig {
    pub fn new(remote: SocketAddr) -> Self {
        Self {
            remote,
            workers: default_worker_count(),
            packet_count: DEFAULT_PACKET_COUNT,
            timeout: Duration::ZERO,
            endpoint: EndpointConfig::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_packet_count(mut self, packet_count: u32) -> Self {
        self.packet_count = packet_count;
        self
    }

    /// Bounds the run by time. The packet count is left alone; callers that
    /// want a purely time-bounded run set it to 0.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_endpoint_config(mut self, endpoint: EndpointConfig) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.port() == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.remote.ip().is_unspecified() {
            return Err(ConfigError::InvalidAddress(self.remote.to_string()));
        }
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkerCount);
        }
        if self.packet_count == 0 && self.timeout.is_zero() {
            return Err(ConfigError::UnboundedTest);
        }
        self.endpoint.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_endpoint_defaults() {
        let config = EndpointConfig::default();
        assert_eq!(config.queue_capacity, 50_000);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.status_interval, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_validation() {
        let config = EndpointConfig::default().with_queue_capacity(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidQueueCapacity));

        let config = EndpointConfig::default().with_poll_interval(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::InvalidPollInterval));

        let config = EndpointConfig::default().with_recv_budget(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidRecvBudget));
    }

    #[test]
    fn test_test_config_validation() {
        assert!(TestConfig::new(local(9999)).validate().is_ok());

        let config = TestConfig::new(local(9999)).with_workers(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidWorkerCount));

        let config = TestConfig::new(local(9999)).with_packet_count(0);
        assert_eq!(config.validate(), Err(ConfigError::UnboundedTest));

        let config = TestConfig::new(local(9999))
            .with_packet_count(0)
            .with_timeout(Duration::from_secs(2));
        assert!(config.validate().is_ok());

        let config = TestConfig::new(local(0));
        assert_eq!(config.validate(), Err(ConfigError::InvalidPort));

        let config = TestConfig::new(SocketAddr::from(([0, 0, 0, 0], 9999)));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_resolve_addr() {
        assert_eq!(resolve_addr("127.0.0.1", 9999), Ok(local(9999)));
        assert_eq!(resolve_addr("127.0.0.1", 0), Err(ConfigError::InvalidPort));
        assert!(matches!(
            resolve_addr("not an address", 9999),
            Err(ConfigError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_default_worker_count_is_positive() {
        assert!(default_worker_count() >= 1);
    }
}
