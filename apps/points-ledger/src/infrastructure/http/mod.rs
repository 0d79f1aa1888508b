//! HTTP/REST API adapter.
//!
//! Inbound adapter exposing the ledger use cases under `/api/user`.

mod controller;
mod identity;
mod response;

pub use controller::{AppState, GatewaySecret, create_router};
pub use identity::{AuthenticatedUser, GATEWAY_TOKEN_HEADER, USER_ID_HEADER};
pub use response::{ApiError, HealthResponse};
