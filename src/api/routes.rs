use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::{ApiError, SharedState};
use crate::constants::{DEFAULT_HISTORY_DAYS, DEFAULT_PER_PAGE};
use crate::types::{ComponentHealth, FavoriteRecord, MarketCoin, PriceHistory, PriceSnapshot};

pub async fn health(State(state): State<SharedState>) -> Json<ComponentHealth> {
    Json(state.tracker.health_check().await)
}

fn require_symbol(symbol: &str) -> Result<&str, ApiError> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(ApiError::validation("Symbol is required"));
    }
    Ok(symbol)
}

pub async fn get_current_price(
    Path(symbol): Path<String>,
    State(state): State<SharedState>,
) -> Result<Json<PriceSnapshot>, ApiError> {
    let symbol = require_symbol(&symbol)?;
    let snapshot = state.tracker.get_current_price(symbol).await?;
    Ok(Json(snapshot))
}

/// Non-numeric or non-positive `days` falls back to the default span
fn parse_days(raw: &str) -> u32 {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|d| *d > 0)
        .unwrap_or(DEFAULT_HISTORY_DAYS)
}

pub async fn get_price_history(
    Path((symbol, days)): Path<(String, String)>,
    State(state): State<SharedState>,
) -> Result<Json<PriceHistory>, ApiError> {
    let symbol = require_symbol(&symbol)?;
    let history = state
        .tracker
        .get_price_history(symbol, parse_days(&days))
        .await?;
    Ok(Json(history))
}

pub async fn get_default_history(
    Path(symbol): Path<String>,
    State(state): State<SharedState>,
) -> Result<Json<PriceHistory>, ApiError> {
    let symbol = require_symbol(&symbol)?;
    let history = state
        .tracker
        .get_price_history(symbol, DEFAULT_HISTORY_DAYS)
        .await?;
    Ok(Json(history))
}

#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    page: Option<String>,
    #[serde(rename = "perPage")]
    per_page: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListingMeta {
    page: u32,
    #[serde(rename = "perPage")]
    per_page: u32,
    count: usize,
}

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    success: bool,
    data: Vec<MarketCoin>,
    meta: ListingMeta,
}

/// Missing or non-numeric values take the default; negative or oversized ones are rejected
fn parse_page_param(raw: Option<&str>, name: &str, default: u32) -> Result<u32, ApiError> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(default);
    };
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(default);
    }
    if negative && digits.bytes().any(|b| b != b'0') {
        return Err(ApiError::validation(format!("{name} must not be negative")));
    }
    digits
        .parse::<u32>()
        .map_err(|_| ApiError::validation(format!("{name} must be at most {}", u32::MAX)))
}

pub async fn get_cryptocurrencies(
    Query(params): Query<ListingQuery>,
    State(state): State<SharedState>,
) -> Result<Json<ListingResponse>, ApiError> {
    let page = parse_page_param(params.page.as_deref(), "page", 1)?;
    let per_page = parse_page_param(params.per_page.as_deref(), "perPage", DEFAULT_PER_PAGE)?;

    let data = state.tracker.list_cryptocurrencies(page, per_page).await?;
    let count = data.len();

    Ok(Json(ListingResponse {
        success: true,
        data,
        meta: ListingMeta {
            page,
            per_page,
            count,
        },
    }))
}

pub async fn get_favorites(
    State(state): State<SharedState>,
) -> Result<Json<Vec<FavoriteRecord>>, ApiError> {
    Ok(Json(state.favorites.list().await?))
}

#[derive(Debug, Deserialize)]
pub struct AddFavoriteRequest {
    symbol: Option<String>,
    name: Option<String>,
}

pub async fn add_favorite(
    State(state): State<SharedState>,
    payload: Result<Json<AddFavoriteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<FavoriteRecord>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::validation(e.body_text()))?;

    let symbol = req.symbol.as_deref().map(str::trim).unwrap_or_default();
    let name = req.name.as_deref().map(str::trim).unwrap_or_default();
    if symbol.is_empty() || name.is_empty() {
        return Err(ApiError::validation("Symbol and name are required"));
    }

    let favorite = state
        .favorites
        .add(symbol, name, state.clock.now())
        .await?;
    tracing::info!(symbol = %favorite.symbol, "Added favorite");

    Ok((StatusCode::CREATED, Json(favorite)))
}

pub async fn is_favorite(
    Path(symbol): Path<String>,
    State(state): State<SharedState>,
) -> Result<Json<Value>, ApiError> {
    let symbol = require_symbol(&symbol)?.to_lowercase();
    let favorite = state.favorites.contains(&symbol).await?;
    Ok(Json(json!({ "symbol": symbol, "favorite": favorite })))
}

pub async fn remove_favorite(
    Path(symbol): Path<String>,
    State(state): State<SharedState>,
) -> Result<Json<Value>, ApiError> {
    let symbol = require_symbol(&symbol)?;
    let removed = state.favorites.remove(symbol).await?;

    if removed == 0 {
        return Err(ApiError::NotFound(format!(
            "Favorite with symbol {symbol} not found"
        )));
    }

    tracing::info!(symbol = %symbol, "Removed favorite");
    Ok(Json(json!({ "message": format!("Removed {symbol} from favorites") })))
}
