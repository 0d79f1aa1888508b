// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::cast_possible_wrap
    )
)]

//! Points Ledger - Rust Core Library
//!
//! Loyalty-points ledger: users upload purchase order numbers, an external
//! accrual system scores them, and the ledger credits the resulting points
//! exactly once and lets users spend them through withdrawals.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: value objects and aggregates with no I/O
//!   - `order_lifecycle`: `LoyaltyOrder`, status state machine, accrual verdicts
//!   - `balance_ledger`: `Account`, `Withdrawal`
//!   - `shared`: `OrderNumber` (Luhn-checked), `Points`, ids, timestamps
//!
//! - **Application**: use cases and orchestration
//!   - `ports`: `LedgerStore`, `AccrualOraclePort`
//!   - `use_cases`: `OrderLifecycleManager`, `BalanceLedger`
//!   - `services`: `ReconciliationDriver`
//!   - `dto`: wire shapes for the HTTP boundary
//!
//! - **Infrastructure**: adapters
//!   - `persistence`: Turso and in-memory stores
//!   - `accrual`: HTTP accrual client
//!   - `http`: axum routes

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// Configuration loading and validation.
pub mod config;

/// Boundary error type.
pub mod error;

/// Prometheus metrics.
pub mod observability;

/// Logging and trace export setup.
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use domain::balance_ledger::{Account, BalanceSummary, Withdrawal};
pub use domain::order_lifecycle::{AccrualVerdict, LoyaltyOrder, OrderStatus};
pub use domain::shared::{OrderNumber, Points, Timestamp, UserId, WithdrawalId};

pub use application::ports::{AccrualOraclePort, LedgerStore, OracleError, StoreError};
pub use application::services::{CycleReport, ReconciliationDriver};
pub use application::use_cases::{
    BalanceLedger, OrderLifecycleManager, ProcessOutcome, UploadOutcome,
};

pub use error::{ErrorCode, LedgerError};

pub use infrastructure::accrual::HttpAccrualOracle;
pub use infrastructure::http::{AppState, create_router};
pub use infrastructure::persistence::{InMemoryLedgerStore, TursoLedgerStore};
