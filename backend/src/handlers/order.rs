//! Purchase order handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::NewOrder;
use uuid::Uuid;

use super::PageQuery;
use crate::middleware::CurrentUser;
use crate::services::order::{OrderFilter, OrderStatusUpdate};
use crate::services::OrderService;
use crate::AppState;

pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(page): Query<PageQuery>,
    Query(filter): Query<OrderFilter>,
) -> impl IntoResponse {
    let service = OrderService::new(state.db.clone());
    let pagination = page.resolve(&state.config.business);
    let offset_hours = state.config.business.utc_offset_hours;

    match service.list_orders(&actor, &filter, &pagination, offset_hours).await {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_order(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = OrderService::new(state.db.clone());

    match service.get_order(&actor, order_id).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Place an order; the quantity is reserved immediately
pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<NewOrder>,
) -> impl IntoResponse {
    let service = OrderService::new(state.db.clone());
    let today = state.config.business.today();

    match service.create_order(&actor, input, today).await {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Approve or reject
pub async fn update_order_status(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<OrderStatusUpdate>,
) -> impl IntoResponse {
    let service = OrderService::new(state.db.clone());

    match service.update_status(&actor, order_id, input).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn cancel_order(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = OrderService::new(state.db.clone());

    match service.cancel_order(&actor, order_id).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => e.into_response(),
    }
}
