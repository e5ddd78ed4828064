/*!
Limits and gateway settings

```
# use car_probe::ProbeConfig;
let config = ProbeConfig::new()
    .with_size_ceiling_mb(50) // never probe dags over 50 MiB
    .with_gateway_url("https://gateway.example");
assert_eq!(config.size_ceiling, 50 * 1024 * 1024);

let config = ProbeConfig::new().with_size_ceiling_mb(u64::MAX);
assert_eq!(config.size_ceiling, u64::MAX);
```
*/

use crate::car::MAX_BLOCK_SIZE;
use crate::decide::SIZE_CEILING;
use crate::gateway::DEFAULT_TIMEOUT;
use std::time::Duration;

pub const DEFAULT_GATEWAY_URL: &str = "https://w3s.link";

/// Builder-style probe setup
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Largest accepted block payload
    ///
    /// Default: 1 MiB
    pub max_block_size: usize,
    /// DAGs expected to be larger than this are never probed
    ///
    /// Default: 100 MiB
    pub size_ceiling: u64,
    /// Base URL of the content gateway
    pub gateway_url: String,
    /// Time budget for the whole gateway request
    ///
    /// Default: 25 seconds
    pub gateway_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_block_size: MAX_BLOCK_SIZE,
            size_ceiling: SIZE_CEILING,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            gateway_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ProbeConfig {
    /// Begin configuring with defaults
    pub fn new() -> Self {
        Default::default()
    }
    pub fn with_max_block_size(mut self, max: usize) -> Self {
        self.max_block_size = max;
        self
    }
    pub fn with_size_ceiling(mut self, ceiling: u64) -> Self {
        self.size_ceiling = ceiling;
        self
    }
    pub fn with_size_ceiling_mb(self, mb: u64) -> Self {
        self.with_size_ceiling(mb.saturating_mul(1 << 20))
    }
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }
    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }
}
