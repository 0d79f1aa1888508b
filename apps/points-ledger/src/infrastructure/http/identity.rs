//! Caller identity.
//!
//! Sessions are handled upstream. The authenticating gateway forwards the
//! user id in `X-User-Id`; when a gateway secret is configured the request
//! must also carry it in `X-Gateway-Token`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::controller::GatewaySecret;
use super::response::ApiError;
use crate::domain::shared::UserId;
use crate::error::{ErrorCode, LedgerError};

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the shared gateway secret.
pub const GATEWAY_TOKEN_HEADER: &str = "x-gateway-token";

/// The user the gateway vouches for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: GatewaySecret + Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(secret) = state.gateway_secret() {
            let presented = parts
                .headers
                .get(GATEWAY_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok());
            if presented != Some(secret) {
                return Err(ApiError(LedgerError::new(
                    ErrorCode::Unauthorized,
                    "Untrusted gateway",
                )));
            }
        }

        let user = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ApiError(LedgerError::new(
                    ErrorCode::Unauthorized,
                    "Missing user identity",
                ))
            })?;

        Ok(Self(UserId::new(user)))
    }
}
