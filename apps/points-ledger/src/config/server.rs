//! HTTP server configuration.

use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, `host:port` or `:port`.
    #[serde(default = "default_run_address")]
    pub run_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            run_address: default_run_address(),
        }
    }
}

impl ServerConfig {
    /// Address to bind, with an empty host widened to all interfaces.
    #[must_use]
    pub fn bind_address(&self) -> String {
        let address = self.run_address.trim();
        if address.starts_with(':') {
            format!("0.0.0.0{address}")
        } else {
            address.to_string()
        }
    }
}

pub(crate) fn default_run_address() -> String {
    ":8080".to_string()
}
