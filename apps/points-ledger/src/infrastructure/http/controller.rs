//! HTTP Controller (Driver Adapter)
//!
//! Axum routes delegating to the ledger use cases. Handlers only translate;
//! every rule lives in the application layer.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use super::identity::AuthenticatedUser;
use super::response::{ApiError, HealthResponse};
use crate::application::dto::{BalanceDto, OrderDto, WithdrawRequestDto, WithdrawalDto};
use crate::application::ports::{AccrualOraclePort, LedgerStore};
use crate::application::use_cases::{BalanceLedger, OrderLifecycleManager, UploadOutcome};
use crate::domain::shared::{OrderNumber, Points};
use crate::error::LedgerError;

/// Access to the configured gateway secret, if any.
pub trait GatewaySecret {
    /// Secret the gateway must present; `None` trusts every caller.
    fn gateway_secret(&self) -> Option<&str>;
}

/// Application state shared across handlers.
pub struct AppState<S, O>
where
    S: LedgerStore,
    O: AccrualOraclePort,
{
    /// Order uploads and listings.
    pub orders: Arc<OrderLifecycleManager<S, O>>,
    /// Accounts, balances and withdrawals.
    pub balances: Arc<BalanceLedger<S>>,
    /// Shared secret expected from the gateway.
    pub gateway_secret: Option<Arc<str>>,
    /// Application version.
    pub version: String,
}

impl<S, O> Clone for AppState<S, O>
where
    S: LedgerStore,
    O: AccrualOraclePort,
{
    fn clone(&self) -> Self {
        Self {
            orders: Arc::clone(&self.orders),
            balances: Arc::clone(&self.balances),
            gateway_secret: self.gateway_secret.clone(),
            version: self.version.clone(),
        }
    }
}

impl<S, O> GatewaySecret for AppState<S, O>
where
    S: LedgerStore,
    O: AccrualOraclePort,
{
    fn gateway_secret(&self) -> Option<&str> {
        self.gateway_secret.as_deref()
    }
}

/// Create the HTTP router with all endpoints.
pub fn create_router<S, O>(state: AppState<S, O>) -> Router
where
    S: LedgerStore + 'static,
    O: AccrualOraclePort + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/api/user/account", post(open_account))
        .route("/api/user/orders", post(upload_order).get(list_orders))
        .route("/api/user/balance", get(get_balance))
        .route("/api/user/balance/withdraw", post(withdraw))
        .route("/api/user/withdrawals", get(list_withdrawals))
        .with_state(state)
}

async fn health_check<S, O>(State(state): State<AppState<S, O>>) -> impl IntoResponse
where
    S: LedgerStore,
    O: AccrualOraclePort,
{
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
    })
}

async fn open_account<S, O>(
    State(state): State<AppState<S, O>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<BalanceDto>, ApiError>
where
    S: LedgerStore,
    O: AccrualOraclePort,
{
    let account = state.balances.open_account(&user).await?;
    Ok(Json(account.summary().into()))
}

async fn upload_order<S, O>(
    State(state): State<AppState<S, O>>,
    AuthenticatedUser(user): AuthenticatedUser,
    body: String,
) -> Result<StatusCode, ApiError>
where
    S: LedgerStore,
    O: AccrualOraclePort,
{
    let raw = body.trim();
    if raw.is_empty() {
        return Err(LedgerError::invalid_request("Order number required").into());
    }
    let number = parse_order_number(raw)?;

    match state.orders.upload_order(&user, number).await? {
        UploadOutcome::Accepted => Ok(StatusCode::ACCEPTED),
        UploadOutcome::AlreadyUploaded => Ok(StatusCode::OK),
    }
}

async fn list_orders<S, O>(
    State(state): State<AppState<S, O>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Response, ApiError>
where
    S: LedgerStore,
    O: AccrualOraclePort,
{
    let orders = state.orders.get_user_orders(&user).await?;
    let body: Vec<OrderDto> = orders.iter().map(OrderDto::from).collect();
    Ok(list_response(body))
}

async fn get_balance<S, O>(
    State(state): State<AppState<S, O>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<BalanceDto>, ApiError>
where
    S: LedgerStore,
    O: AccrualOraclePort,
{
    let summary = state.balances.get_balance(&user).await?;
    Ok(Json(summary.into()))
}

async fn withdraw<S, O>(
    State(state): State<AppState<S, O>>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: Result<Json<WithdrawRequestDto>, JsonRejection>,
) -> Result<Json<WithdrawalDto>, ApiError>
where
    S: LedgerStore,
    O: AccrualOraclePort,
{
    let Json(request) =
        payload.map_err(|e| LedgerError::invalid_request(e.body_text()))?;
    let order = parse_order_number(&request.order)?;

    let withdrawal = state
        .balances
        .withdraw(&user, order, Points::new(request.sum))
        .await?;
    Ok(Json(WithdrawalDto::from(&withdrawal)))
}

async fn list_withdrawals<S, O>(
    State(state): State<AppState<S, O>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Response, ApiError>
where
    S: LedgerStore,
    O: AccrualOraclePort,
{
    let withdrawals = state.balances.get_withdrawals(&user).await?;
    let body: Vec<WithdrawalDto> = withdrawals.iter().map(WithdrawalDto::from).collect();
    Ok(list_response(body))
}

fn parse_order_number(raw: &str) -> Result<OrderNumber, LedgerError> {
    OrderNumber::parse(raw).map_err(|e| {
        LedgerError::invalid_order_number(e.to_string()).with_context("order_number", raw)
    })
}

/// `204` for an empty list, `200` with the items otherwise.
fn list_response<T: serde::Serialize>(items: Vec<T>) -> Response {
    if items.is_empty() {
        StatusCode::NO_CONTENT.into_response()
    } else {
        Json(items).into_response()
    }
}
