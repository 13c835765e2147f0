//! # REST API
//!
//! Builds the axum router that exposes the deployed sale over HTTP.
//! All endpoints share application state through axum's `State` extractor.
//!
//! Amounts in request and response bodies are base-unit integer strings
//! (`"10000000000000000000"` is ten whole units). Prices are whole-unit
//! decimals (`"0.025"`).
//!
//! ## Endpoints
//!
//! | Method | Path                   | Description                          |
//! |--------|------------------------|--------------------------------------|
//! | GET    | `/health`              | Liveness probe                       |
//! | GET    | `/sale`                | Coordinator snapshot                 |
//! | GET    | `/balances/:address`   | Token and native balances            |
//! | GET    | `/events`              | Sale, allow-list, and token events   |
//! | POST   | `/allowlist/add`       | Approve an address (administrator)   |
//! | POST   | `/allowlist/remove`    | Revoke an address (administrator)    |
//! | POST   | `/buy`                 | Purchase units with a native payment |
//! | POST   | `/price`               | Change the price (owner)             |
//! | POST   | `/finalize`            | Sweep the sale to the owner          |
//! | POST   | `/faucet`              | Credit native currency (devnet)      |

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crowdsale_contracts::{
    Address, Amount, CallContext, Deployment, GateError, GateEvent, LedgerError, LedgerEvent,
    Price, SaleError, SaleEvent, TokenLedger,
};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The deployed contracts. Handlers never hold the lock across an await.
    pub deployment: Arc<Mutex<Deployment>>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    pub fn new(version: impl Into<String>, deployment: Deployment, metrics: SharedMetrics) -> Self {
        let state = Self {
            version: version.into(),
            deployment: Arc::new(Mutex::new(deployment)),
            metrics,
        };
        state.refresh_gauges(&state.deployment.lock());
        state
    }

    fn refresh_gauges(&self, deployment: &Deployment) {
        let approved = deployment.gate.read().approved_count();
        self.metrics.observe(&deployment.sale.snapshot(), approved);
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/sale", get(sale_handler))
        .route("/balances/:address", get(balances_handler))
        .route("/events", get(events_handler))
        .route("/allowlist/add", post(allowlist_add_handler))
        .route("/allowlist/remove", post(allowlist_remove_handler))
        .route("/buy", post(buy_handler))
        .route("/price", post(price_handler))
        .route("/finalize", post(finalize_handler))
        .route("/faucet", post(faucet_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /allowlist/add` and `POST /allowlist/remove`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AllowlistRequest {
    pub caller: Address,
    pub address: Address,
}

/// Body of `POST /buy`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BuyRequest {
    /// Account paying for the purchase.
    pub caller: Address,
    /// Account receiving the units. Must be allow-listed.
    pub beneficiary: Address,
    /// Units to buy, in base units.
    pub amount: Amount,
    /// Native payment attached to the call, in base units.
    pub value: Amount,
}

/// Body of `POST /price`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PriceRequest {
    pub caller: Address,
    pub price: Price,
}

/// Body of `POST /finalize`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub caller: Address,
}

/// Body of `POST /faucet`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FaucetRequest {
    pub address: Address,
    pub amount: Amount,
}

/// Response payload for `GET /balances/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BalancesResponse {
    pub address: Address,
    pub token: Amount,
    pub native: Amount,
    pub approved: bool,
}

/// Response payload for `GET /events`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    pub sale: Vec<SaleEvent>,
    pub allowlist: Vec<GateEvent>,
    pub token: Vec<LedgerEvent>,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable code, e.g. `"incorrect_payment"`.
    pub code: String,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// A rejected call, rendered as an [`ErrorResponse`].
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                code: self.code.into(),
            }),
        )
            .into_response()
    }
}

impl From<SaleError> for ApiError {
    fn from(err: SaleError) -> Self {
        let status = match &err {
            SaleError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            SaleError::NotStarted { .. } | SaleError::SaleFinalized => StatusCode::CONFLICT,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        let status = match &err {
            GateError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            GateError::AlreadyApproved(_) | GateError::NotApproved(_) => StatusCode::CONFLICT,
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.code(), err.to_string())
    }
}

/// Counts the rejection, then converts it.
fn rejected(state: &AppState, operation: &str, err: impl Into<ApiError>) -> ApiError {
    let err = err.into();
    state.metrics.record_rejection(operation, err.code);
    tracing::debug!(operation, code = err.code, "call rejected: {}", err.message);
    err
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "version": state.version })),
    )
}

/// `GET /sale`: the coordinator's parameters and balances.
async fn sale_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.deployment.lock().sale.snapshot();
    Json(snapshot)
}

/// `GET /balances/:address`: token and native balances of one account.
async fn balances_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<BalancesResponse>, ApiError> {
    let address: Address = address
        .parse()
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, "invalid_address", format!("{e}")))?;

    let deployment = state.deployment.lock();
    let token = deployment.token.lock().balance_of(&address);
    let native = deployment.native.lock().balance_of(&address);
    let approved = deployment.gate.read().is_approved(&address);

    Ok(Json(BalancesResponse {
        address,
        token,
        native,
        approved,
    }))
}

/// `GET /events`: every event emitted since deployment, oldest first.
async fn events_handler(State(state): State<AppState>) -> impl IntoResponse {
    let deployment = state.deployment.lock();
    let sale = deployment.sale.events().entries().to_vec();
    let allowlist = deployment.gate.read().events().entries().to_vec();
    let token = deployment.token.lock().events().entries().to_vec();
    Json(EventsResponse {
        sale,
        allowlist,
        token,
    })
}

/// `POST /allowlist/add`
async fn allowlist_add_handler(
    State(state): State<AppState>,
    Json(req): Json<AllowlistRequest>,
) -> Result<StatusCode, ApiError> {
    let deployment = state.deployment.lock();
    let added = deployment.gate.write().add_address(&req.caller, req.address);
    added.map_err(|e| rejected(&state, "allowlist_add", e))?;
    state.refresh_gauges(&deployment);
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /allowlist/remove`
async fn allowlist_remove_handler(
    State(state): State<AppState>,
    Json(req): Json<AllowlistRequest>,
) -> Result<StatusCode, ApiError> {
    let deployment = state.deployment.lock();
    let removed = deployment
        .gate
        .write()
        .remove_address(&req.caller, req.address);
    removed.map_err(|e| rejected(&state, "allowlist_remove", e))?;
    state.refresh_gauges(&deployment);
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /buy`: executes a purchase at the current wall-clock time.
async fn buy_handler(
    State(state): State<AppState>,
    Json(req): Json<BuyRequest>,
) -> Result<Json<SaleEvent>, ApiError> {
    let ctx = CallContext::new(req.caller).with_value(req.value);

    let mut deployment = state.deployment.lock();
    deployment
        .sale
        .buy_tokens(&ctx, req.amount, req.beneficiary)
        .map_err(|e| rejected(&state, "buy", e))?;

    state.metrics.purchases_total.inc();
    state.refresh_gauges(&deployment);
    Ok(Json(SaleEvent::Buy {
        amount: req.amount,
        beneficiary: req.beneficiary,
    }))
}

/// `POST /price`
async fn price_handler(
    State(state): State<AppState>,
    Json(req): Json<PriceRequest>,
) -> Result<StatusCode, ApiError> {
    let mut deployment = state.deployment.lock();
    deployment
        .sale
        .set_price(&req.caller, req.price)
        .map_err(|e| rejected(&state, "set_price", e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /finalize`: returns what was moved to the owner.
async fn finalize_handler(
    State(state): State<AppState>,
    Json(req): Json<FinalizeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut deployment = state.deployment.lock();
    let settlement = deployment
        .sale
        .finalize(&req.caller)
        .map_err(|e| rejected(&state, "finalize", e))?;
    state.refresh_gauges(&deployment);
    Ok(Json(settlement))
}

/// `POST /faucet`: credits native currency so accounts can pay.
async fn faucet_handler(
    State(state): State<AppState>,
    Json(req): Json<FaucetRequest>,
) -> Result<Json<BalancesResponse>, ApiError> {
    let deployment = state.deployment.lock();
    let mut native = deployment.native.lock();
    native
        .credit(&req.address, req.amount)
        .map_err(|e| rejected(&state, "faucet", e))?;
    let balance = native.balance_of(&req.address);
    drop(native);

    let token = deployment.token.lock().balance_of(&req.address);
    let approved = deployment.gate.read().is_approved(&req.address);

    tracing::info!(address = %req.address, amount = %req.amount, "faucet credit");
    Ok(Json(BalancesResponse {
        address: req.address,
        token,
        native: balance,
        approved,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
