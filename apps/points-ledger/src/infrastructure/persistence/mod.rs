//! Persistence Adapters
//!
//! Implementations of the `LedgerStore` port.

pub mod in_memory;
pub mod turso_store;

pub use in_memory::InMemoryLedgerStore;
pub use turso_store::TursoLedgerStore;
