//! REST boundary over [`LedgerService`].
//!
//! Every route except `/health` requires `Authorization: Bearer <token>`.
//! Errors are returned as `{"detail": "<message>"}`.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, Request, State,
    },
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::application::{AppError, BalanceInfo, CreateTransaction, LedgerService, RetryOutcome};
use crate::domain::{
    AccountSummary, IntegrityReport, Transaction, TransactionId, TransactionStatus,
};

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
pub const MAX_HISTORY_LIMIT: u32 = 500;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<LedgerService>,
    pub api_token: Arc<str>,
}

impl ApiState {
    pub fn new(service: Arc<LedgerService>, api_token: impl Into<Arc<str>>) -> Self {
        Self {
            service,
            api_token: api_token.into(),
        }
    }
}

/// Build the application router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/account/:account_number/balance", get(get_balance))
        .route("/account/:account_number/transactions", get(list_transactions))
        .route("/account/:account_number/summary", get(account_summary))
        .route("/account/:account_number/integrity", get(verify_account))
        .route("/transactions", post(create_transaction))
        .route("/transactions/failed", get(list_failed_transactions))
        .route("/transactions/:transaction_id", get(get_transaction))
        .route("/transactions/:transaction_id/retry", post(retry_transaction))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token))
        .route("/health", get(health))
        .with_state(state)
}

/// Error returned by every handler, rendered as `{"detail": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = match &err {
            AppError::AccountNotFound(_)
            | AppError::TransactionNotFound(_)
            | AppError::NotFoundOrNotFailed(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            AppError::InvalidAmount(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidStatusTransition { .. } => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, detail = %self.detail, "request failed");
        } else {
            debug!(status = %self.status, detail = %self.detail, "request rejected");
        }
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn require_token(State(state): State<ApiState>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == &*state.api_token);

    if !authorized {
        warn!(path = %request.uri().path(), "rejected request: invalid token");
        return ApiError::new(StatusCode::UNAUTHORIZED, "Invalid authentication token")
            .into_response();
    }
    next.run(request).await
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "timestamp": Utc::now() }))
}

async fn get_balance(
    State(state): State<ApiState>,
    Path(account_number): Path<String>,
) -> ApiResult<BalanceInfo> {
    Ok(Json(state.service.get_balance(&account_number).await?))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
    pub status_filter: Option<String>,
}

impl HistoryQuery {
    fn limit(&self) -> Result<u32, ApiError> {
        match self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT) {
            limit @ 1..=MAX_HISTORY_LIMIT => Ok(limit),
            limit => Err(ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("limit must be between 1 and {}, got {}", MAX_HISTORY_LIMIT, limit),
            )),
        }
    }

    /// Status names match exactly. `Err(())` means the filter names no status,
    /// so nothing can match it.
    fn status(&self) -> Result<Option<TransactionStatus>, ()> {
        match self.status_filter.as_deref() {
            None => Ok(None),
            Some(name) => TransactionStatus::ALL
                .into_iter()
                .find(|status| status.as_str() == name)
                .map(Some)
                .ok_or(()),
        }
    }
}

async fn list_transactions(
    State(state): State<ApiState>,
    Path(account_number): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Vec<Transaction>> {
    let Query(query) = query?;
    let limit = query.limit()?;
    let Ok(status) = query.status() else {
        return Ok(Json(Vec::new()));
    };
    let transactions = state
        .service
        .list_transactions(&account_number, status, limit)
        .await?;
    Ok(Json(transactions))
}

async fn account_summary(
    State(state): State<ApiState>,
    Path(account_number): Path<String>,
) -> ApiResult<AccountSummary> {
    Ok(Json(state.service.account_summary(&account_number).await?))
}

async fn verify_account(
    State(state): State<ApiState>,
    Path(account_number): Path<String>,
) -> ApiResult<IntegrityReport> {
    Ok(Json(state.service.verify_account(&account_number).await?))
}

async fn list_failed_transactions(
    State(state): State<ApiState>,
) -> ApiResult<Vec<Transaction>> {
    Ok(Json(state.service.list_failed_transactions().await?))
}

async fn get_transaction(
    State(state): State<ApiState>,
    transaction_id: Result<Path<TransactionId>, PathRejection>,
) -> ApiResult<Transaction> {
    let Path(transaction_id) = transaction_id?;
    Ok(Json(state.service.get_transaction(transaction_id).await?))
}

async fn create_transaction(
    State(state): State<ApiState>,
    payload: Result<Json<CreateTransaction>, JsonRejection>,
) -> ApiResult<Transaction> {
    let Json(request) = payload?;
    Ok(Json(state.service.create_transaction(request).await?))
}

async fn retry_transaction(
    State(state): State<ApiState>,
    transaction_id: Result<Path<TransactionId>, PathRejection>,
) -> ApiResult<RetryOutcome> {
    let Path(transaction_id) = transaction_id?;
    Ok(Json(state.service.retry_transaction(transaction_id).await?))
}
