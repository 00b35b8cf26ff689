// Proxy Configuration
//
// Runtime settings for the proxy core, loaded from environment variables.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::duration::millis;

/// Proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Unique instance id (generated if not provided), used in logs
    pub instance_id: String,

    /// Deadline for each client-scoped engine call
    #[serde(with = "millis")]
    pub client_call_timeout: Duration,

    /// Upper bound on a queue's requested capacity
    pub max_queue_capacity: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            instance_id: format!("proxy-{}", Uuid::now_v7()),
            client_call_timeout: Duration::from_secs(10),
            max_queue_capacity: 10_000,
        }
    }
}

impl ProxyConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `PROXY_INSTANCE_ID`: Instance id (default: generated)
    /// - `PROXY_CLIENT_TIMEOUT_MS`: Client call deadline in milliseconds (default: 10000)
    /// - `PROXY_MAX_QUEUE_CAPACITY`: Largest allowed queue capacity (default: 10000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let instance_id = env::var("PROXY_INSTANCE_ID").unwrap_or(defaults.instance_id);

        let client_call_timeout = env::var("PROXY_CLIENT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.client_call_timeout);

        let max_queue_capacity = env::var("PROXY_MAX_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_queue_capacity);

        Self {
            instance_id,
            client_call_timeout,
            max_queue_capacity,
        }
        .normalized()
    }

    /// Set instance id
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    /// Set client call deadline
    pub fn with_client_call_timeout(mut self, timeout: Duration) -> Self {
        self.client_call_timeout = timeout;
        self
    }

    /// Set max queue capacity
    pub fn with_max_queue_capacity(mut self, capacity: usize) -> Self {
        self.max_queue_capacity = capacity.max(1);
        self
    }

    /// Clamp the queue capacity a host asked for
    pub fn queue_capacity(&self, requested: usize) -> usize {
        requested.clamp(1, self.max_queue_capacity.max(1))
    }

    fn normalized(mut self) -> Self {
        self.max_queue_capacity = self.max_queue_capacity.max(1);
        self
    }
}
