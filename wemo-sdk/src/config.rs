//! Configuration for the SDK controller and its subscription engines.

use std::net::IpAddr;
use std::time::Duration;

use crate::error::SdkError;

/// Configuration for [`WemoSdk`](crate::WemoSdk)
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Port range for the callback server
    /// Default: (3500, 3600)
    pub callback_port_range: (u16, u16),

    /// Address advertised in callback URLs; detected from the routing table
    /// when unset
    pub callback_host: Option<IpAddr>,

    /// Timeout requested on SUBSCRIBE
    /// Default: 300 seconds
    pub subscription_timeout: Duration,

    /// How long before expiry a subscription is renewed
    /// Default: 150 seconds
    pub renewal_margin: Duration,

    /// Delay before retrying a failed subscription
    /// Default: 2 seconds
    pub retry_backoff: Duration,

    /// Connect timeout for control and subscription requests
    /// Default: 5 seconds
    pub rpc_connect_timeout: Duration,

    /// Read timeout for control and subscription requests
    /// Default: 10 seconds
    pub rpc_read_timeout: Duration,

    /// The two ports devices are known to listen on; connection-refused
    /// recovery switches between them
    /// Default: (49152, 49153)
    pub candidate_ports: (u16, u16),

    /// Capacity of each endpoint's event broadcast channel
    /// Default: 256
    pub event_buffer_size: usize,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            callback_port_range: (3500, 3600),
            callback_host: None,
            subscription_timeout: Duration::from_secs(300),
            renewal_margin: Duration::from_secs(150),
            retry_backoff: Duration::from_secs(2),
            rpc_connect_timeout: Duration::from_secs(5),
            rpc_read_timeout: Duration::from_secs(10),
            candidate_ports: (49152, 49153),
            event_buffer_size: 256,
        }
    }
}

impl SdkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return the first problem found
    pub fn validate(&self) -> Result<(), SdkError> {
        if self.callback_port_range.0 > self.callback_port_range.1 {
            return Err(SdkError::Configuration(
                "Invalid callback port range: start must not exceed end".to_string(),
            ));
        }

        if self.subscription_timeout.as_secs() == 0 {
            return Err(SdkError::Configuration(
                "Subscription timeout must be at least one second".to_string(),
            ));
        }

        if self.subscription_timeout.as_secs() > u64::from(u32::MAX) {
            return Err(SdkError::Configuration(
                "Subscription timeout is too large".to_string(),
            ));
        }

        if self.retry_backoff.is_zero() {
            return Err(SdkError::Configuration(
                "Retry backoff must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(SdkError::Configuration(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_callback_ports(mut self, start: u16, end: u16) -> Self {
        self.callback_port_range = (start, end);
        self
    }

    pub fn with_callback_host(mut self, host: IpAddr) -> Self {
        self.callback_host = Some(host);
        self
    }

    pub fn with_subscription_timeout(mut self, timeout: Duration) -> Self {
        self.subscription_timeout = timeout;
        self
    }

    pub fn with_renewal_margin(mut self, margin: Duration) -> Self {
        self.renewal_margin = margin;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_rpc_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.rpc_connect_timeout = connect;
        self.rpc_read_timeout = read;
        self
    }

    pub fn with_candidate_ports(mut self, first: u16, second: u16) -> Self {
        self.candidate_ports = (first, second);
        self
    }

    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    /// Requested subscription timeout in whole seconds
    pub(crate) fn timeout_seconds(&self) -> u32 {
        u32::try_from(self.subscription_timeout.as_secs()).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SdkConfig::default();
        assert_eq!(config.callback_port_range, (3500, 3600));
        assert_eq!(config.subscription_timeout, Duration::from_secs(300));
        assert_eq!(config.renewal_margin, Duration::from_secs(150));
        assert_eq!(config.retry_backoff, Duration::from_secs(2));
        assert_eq!(config.candidate_ports, (49152, 49153));
        assert_eq!(config.timeout_seconds(), 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let inverted = SdkConfig::new().with_callback_ports(3600, 3500);
        assert!(inverted.validate().is_err());

        let zero_timeout = SdkConfig::new().with_subscription_timeout(Duration::ZERO);
        assert!(zero_timeout.validate().is_err());

        let zero_backoff = SdkConfig::new().with_retry_backoff(Duration::ZERO);
        assert!(zero_backoff.validate().is_err());

        let no_buffer = SdkConfig::new().with_event_buffer_size(0);
        assert!(no_buffer.validate().is_err());
    }

    #[test]
    fn test_builder_pattern() {
        let config = SdkConfig::new()
            .with_callback_ports(4000, 4000)
            .with_callback_host("10.0.0.5".parse().unwrap())
            .with_subscription_timeout(Duration::from_secs(600))
            .with_renewal_margin(Duration::from_secs(60))
            .with_candidate_ports(49153, 49154);

        assert_eq!(config.callback_port_range, (4000, 4000));
        assert_eq!(config.callback_host, Some("10.0.0.5".parse().unwrap()));
        assert_eq!(config.timeout_seconds(), 600);
        assert_eq!(config.candidate_ports, (49153, 49154));
        assert!(config.validate().is_ok());
    }
}
