//! Ledger database configuration.

use serde::{Deserialize, Serialize};

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database file path. `:memory:` keeps everything in process.
    #[serde(default = "default_database_uri")]
    pub database_uri: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_uri: default_database_uri(),
        }
    }
}

impl PersistenceConfig {
    /// True when the ledger lives only in memory.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.database_uri == ":memory:"
    }
}

fn default_database_uri() -> String {
    "./data/ledger.db".to_string()
}
