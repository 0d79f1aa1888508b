//! Gateway trust configuration.

use serde::{Deserialize, Serialize};

/// Shared secret between the authenticating gateway and the ledger.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Expected `X-Gateway-Token`; empty disables the check.
    #[serde(default)]
    pub secret: String,
}

impl AuthConfig {
    /// The secret, if one is configured.
    #[must_use]
    pub fn gateway_secret(&self) -> Option<&str> {
        Some(self.secret.as_str()).filter(|s| !s.is_empty())
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &if self.secret.is_empty() { "" } else { "[REDACTED]" })
            .finish()
    }
}
