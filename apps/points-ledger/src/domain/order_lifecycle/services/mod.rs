//! Order lifecycle domain services.

mod order_state_machine;

pub use order_state_machine::{OrderStateMachine, ReconcileStep};
