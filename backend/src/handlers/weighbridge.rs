//! Weighbridge handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::WeighOutReading;
use uuid::Uuid;

use super::PageQuery;
use crate::middleware::CurrentUser;
use crate::services::weighbridge::{WeighInRequest, WeighbridgeFilter};
use crate::services::WeighbridgeService;
use crate::AppState;

pub async fn list_weighings(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(page): Query<PageQuery>,
    Query(filter): Query<WeighbridgeFilter>,
) -> impl IntoResponse {
    let service = WeighbridgeService::new(state.db.clone());
    let pagination = page.resolve(&state.config.business);

    match service.list(&actor, &filter, &pagination).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn weigh_in(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(record_id): Path<Uuid>,
    Json(input): Json<WeighInRequest>,
) -> impl IntoResponse {
    let service = WeighbridgeService::new(state.db.clone());

    match service.weigh_in(&actor, record_id, input).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Weigh out, complete the order and issue its documents
pub async fn weigh_out(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(record_id): Path<Uuid>,
    Json(input): Json<WeighOutReading>,
) -> impl IntoResponse {
    let service = WeighbridgeService::new(state.db.clone());
    let business = &state.config.business;

    match service
        .weigh_out(&actor, record_id, input, &business.grade_policy(), business.today())
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}
