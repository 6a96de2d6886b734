//! # Builder for SessionConfig
//!
//! Fluent construction of [`SessionConfig`] values.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use m3u8d_engine::SessionConfig;
//!
//! let config = SessionConfig::builder()
//!     .with_download_concurrency(4)
//!     .with_retry_delay_unit(Duration::from_millis(500))
//!     .with_timeout(Duration::from_secs(30))
//!     .build();
//!
//! assert_eq!(config.download_concurrency, 4);
//! ```

use std::time::Duration;

use crate::SessionConfig;

/// Builder for creating SessionConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
        }
    }

    /// Set the number of segments downloaded in parallel (at least one)
    pub fn with_download_concurrency(mut self, concurrency: usize) -> Self {
        self.config.download_concurrency = concurrency.max(1);
        self
    }

    /// Set the number of attempts per segment (at least one)
    pub fn with_max_segment_attempts(mut self, attempts: u32) -> Self {
        self.config.max_segment_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay_unit(mut self, unit: Duration) -> Self {
        self.config.retry_delay_unit = unit;
        self
    }

    pub fn with_max_resolve_hops(mut self, hops: usize) -> Self {
        self.config.max_resolve_hops = hops;
        self
    }

    pub fn with_max_name_probes(mut self, probes: usize) -> Self {
        self.config.max_name_probes = probes;
        self
    }

    /// Set the overall timeout for a single HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the final configuration
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
