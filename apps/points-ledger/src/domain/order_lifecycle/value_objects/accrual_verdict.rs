//! What the accrual system says about an order.

use crate::domain::shared::Points;

/// The accrual system's current answer for an order number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccrualVerdict {
    /// The accrual system has never heard of the order.
    Unknown,
    /// Registered upstream, scoring not started.
    Registered,
    /// Scoring in progress.
    Processing,
    /// Final: the order earns the given points.
    Processed(Points),
    /// Final: the order earns nothing.
    Invalid,
}
