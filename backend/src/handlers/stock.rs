//! Plantation and stock lot handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::{NewStockLot, StockLotUpdate};
use uuid::Uuid;

use super::PageQuery;
use crate::middleware::CurrentUser;
use crate::services::stock::StockFilter;
use crate::services::StockService;
use crate::AppState;

/// Active plantations
pub async fn list_kebun(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
) -> impl IntoResponse {
    let service = StockService::new(state.db.clone());

    match service.list_kebun().await {
        Ok(kebun) => (StatusCode::OK, Json(serde_json::json!({ "data": kebun }))).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn list_stock(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
    Query(page): Query<PageQuery>,
    Query(filter): Query<StockFilter>,
) -> impl IntoResponse {
    let service = StockService::new(state.db.clone());
    let pagination = page.resolve(&state.config.business);

    match service.list_stock(&filter, &pagination).await {
        Ok(lots) => (StatusCode::OK, Json(lots)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_stock(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
    Path(stock_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = StockService::new(state.db.clone());

    match service.get_stock(stock_id).await {
        Ok(lot) => (StatusCode::OK, Json(lot)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Register a harvested lot
pub async fn create_stock(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<NewStockLot>,
) -> impl IntoResponse {
    let service = StockService::new(state.db.clone());

    match service.create_stock(&actor, input).await {
        Ok(lot) => (StatusCode::CREATED, Json(lot)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn update_stock(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(stock_id): Path<Uuid>,
    Json(input): Json<StockLotUpdate>,
) -> impl IntoResponse {
    let service = StockService::new(state.db.clone());

    match service.update_stock(&actor, stock_id, input).await {
        Ok(lot) => (StatusCode::OK, Json(lot)).into_response(),
        Err(e) => e.into_response(),
    }
}
