//! HTTP API for the mining daemon.
//!
//! Provides REST endpoints for:
//! - Health check
//! - User lookup (get-or-create)
//! - Case opening
//! - Stand purchase and listing
//! - Card install / pull / withdraw / refill
//!
//! Every failure uses one convention: an HTTP status plus
//! `{"status":"error","code":..,"error":..}`.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request, State},
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use miner_domain::{Card, CardId, CardStand, StandId, StandWithCard, User};
use miner_engine::{
    CaseOpening, Economy, EconomyError, Installation, Refill, RewardGenerator, Withdrawal,
};
use miner_store::Store;

use crate::config::CorsOrigins;

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState {
    pub economy: Economy<dyn Store>,
}

impl ApiState {
    /// Build the state over any store.
    pub fn new(store: Arc<dyn Store>, rewards: RewardGenerator) -> Self {
        Self {
            economy: Economy::new(store, rewards),
        }
    }
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Successful response: `"status":"success"` next to the payload fields.
#[derive(Debug, Serialize)]
pub struct Success<T: Serialize> {
    pub status: &'static str,
    #[serde(flatten)]
    pub data: T,
}

fn success<T: Serialize>(data: T) -> Json<Success<T>> {
    Json(Success {
        status: "success",
        data,
    })
}

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct StandBody {
    pub stand: CardStand,
}

#[derive(Debug, Serialize)]
pub struct StandsBody {
    pub stands: Vec<StandWithCard>,
}

#[derive(Debug, Serialize)]
pub struct CardBody {
    pub card: Card,
}

#[derive(Debug, Serialize)]
pub struct CardsBody {
    pub cards: Vec<Card>,
}

/// Request to mount a card into a stand.
#[derive(Debug, Deserialize)]
pub struct InstallRequest {
    pub card_id: CardId,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub code: &'static str,
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Extractors
// =============================================================================

/// `Path` whose rejection is an `ErrorResponse` with code `invalid_path`.
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(malformed_request("invalid_path", rejection.body_text())),
        }
    }
}

/// `Json` body whose rejection is an `ErrorResponse` with code `invalid_body`.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(malformed_request("invalid_body", rejection.body_text())),
        }
    }
}

/// Malformed requests are always 400, never the 422 used for economy rejections.
fn malformed_request(code: &'static str, message: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            status: "error",
            code,
            error: message,
        }),
    )
}

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/users/:identity", get(user_handler))
        .route("/users/:identity/case/open", post(open_case_handler))
        .route("/users/:identity/stands", get(list_stands_handler).post(buy_stand_handler))
        .route("/users/:identity/stands/:stand_id/install", post(install_card_handler))
        .route("/users/:identity/cards", get(list_cards_handler))
        .route("/users/:identity/cards/:card_id/pull", post(pull_card_handler))
        .route("/users/:identity/cards/:card_id/withdraw", post(withdraw_handler))
        .route("/users/:identity/cards/:card_id/refill", post(refill_handler))
        .route("/cards/:card_id", get(get_card_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy for the configured origins.
pub fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let allow_origin = match origins {
        CorsOrigins::Any => AllowOrigin::any(),
        CorsOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(%origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(values)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([header::CONTENT_TYPE])
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn user_handler(
    State(state): State<Arc<ApiState>>,
    ApiPath(identity): ApiPath<String>,
) -> ApiResult<Json<Success<UserBody>>> {
    let user = state
        .economy
        .get_or_create_user(&identity)
        .await
        .map_err(to_error_response)?;
    Ok(success(UserBody { user }))
}

async fn open_case_handler(
    State(state): State<Arc<ApiState>>,
    ApiPath(identity): ApiPath<String>,
) -> ApiResult<Json<Success<CaseOpening>>> {
    let opening = state.economy.open_case(&identity).await.map_err(to_error_response)?;
    Ok(success(opening))
}

async fn list_stands_handler(
    State(state): State<Arc<ApiState>>,
    ApiPath(identity): ApiPath<String>,
) -> ApiResult<Json<Success<StandsBody>>> {
    let stands = state.economy.list_stands(&identity).await.map_err(to_error_response)?;
    Ok(success(StandsBody { stands }))
}

async fn buy_stand_handler(
    State(state): State<Arc<ApiState>>,
    ApiPath(identity): ApiPath<String>,
) -> ApiResult<(StatusCode, Json<Success<StandBody>>)> {
    let stand = state.economy.buy_stand(&identity).await.map_err(to_error_response)?;
    Ok((StatusCode::CREATED, success(StandBody { stand })))
}

async fn install_card_handler(
    State(state): State<Arc<ApiState>>,
    ApiPath((identity, stand_id)): ApiPath<(String, StandId)>,
    ApiJson(req): ApiJson<InstallRequest>,
) -> ApiResult<Json<Success<Installation>>> {
    let installation = state
        .economy
        .install_card(&identity, stand_id, req.card_id)
        .await
        .map_err(to_error_response)?;
    Ok(success(installation))
}

async fn list_cards_handler(
    State(state): State<Arc<ApiState>>,
    ApiPath(identity): ApiPath<String>,
) -> ApiResult<Json<Success<CardsBody>>> {
    let cards = state.economy.list_cards(&identity).await.map_err(to_error_response)?;
    Ok(success(CardsBody { cards }))
}

async fn pull_card_handler(
    State(state): State<Arc<ApiState>>,
    ApiPath((identity, card_id)): ApiPath<(String, CardId)>,
) -> ApiResult<Json<Success<StandBody>>> {
    let stand = state
        .economy
        .pull_card(&identity, card_id)
        .await
        .map_err(to_error_response)?;
    Ok(success(StandBody { stand }))
}

async fn withdraw_handler(
    State(state): State<Arc<ApiState>>,
    ApiPath((identity, card_id)): ApiPath<(String, CardId)>,
) -> ApiResult<Json<Success<Withdrawal>>> {
    let withdrawal = state
        .economy
        .withdraw_card_earnings(&identity, card_id)
        .await
        .map_err(to_error_response)?;
    Ok(success(withdrawal))
}

async fn refill_handler(
    State(state): State<Arc<ApiState>>,
    ApiPath((identity, card_id)): ApiPath<(String, CardId)>,
) -> ApiResult<Json<Success<Refill>>> {
    let refill = state
        .economy
        .refill_fuel(&identity, card_id)
        .await
        .map_err(to_error_response)?;
    Ok(success(refill))
}

async fn get_card_handler(
    State(state): State<Arc<ApiState>>,
    ApiPath(card_id): ApiPath<CardId>,
) -> ApiResult<Json<Success<CardBody>>> {
    let card = state.economy.get_card(card_id).await.map_err(to_error_response)?;
    Ok(success(CardBody { card }))
}

// =============================================================================
// Helpers
// =============================================================================

/// HTTP status for an economy failure.
pub fn status_for(error: &EconomyError) -> StatusCode {
    match error {
        EconomyError::CardNotFound(_) | EconomyError::StandNotFound(_) => StatusCode::NOT_FOUND,
        EconomyError::CardNotOwned(_) | EconomyError::StandNotOwned(_) => StatusCode::FORBIDDEN,
        EconomyError::CardAlreadyInstalled(_)
        | EconomyError::StandOccupied(_)
        | EconomyError::CardNotMounted(_) => StatusCode::CONFLICT,
        EconomyError::InsufficientChests
        | EconomyError::MaxSlotsReached { .. }
        | EconomyError::InsufficientBalance { .. }
        | EconomyError::NothingToWithdraw(_)
        | EconomyError::NoFreezeTokens
        | EconomyError::FuelAlreadyFull(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EconomyError::Repository(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        EconomyError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn to_error_response(error: EconomyError) -> ApiError {
    let status = status_for(&error);
    if !error.is_rejection() {
        error!(code = error.code(), %status, error = %error, "Request failed");
    }

    (
        status,
        Json(ErrorResponse {
            status: "error",
            code: error.code(),
            error: error.to_string(),
        }),
    )
}

// =============================================================================
// Tests
// =============================================================================
