//! Payment handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::NewPayment;
use uuid::Uuid;

use super::PageQuery;
use crate::middleware::CurrentUser;
use crate::services::payment::{PaymentFilter, VerifyPaymentRequest};
use crate::services::PaymentService;
use crate::AppState;

pub async fn list_payments(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(page): Query<PageQuery>,
    Query(filter): Query<PaymentFilter>,
) -> impl IntoResponse {
    let service = PaymentService::new(state.db.clone());
    let pagination = page.resolve(&state.config.business);

    match service.list(&actor, &filter, &pagination).await {
        Ok(payments) => (StatusCode::OK, Json(payments)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn create_payment(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<NewPayment>,
) -> impl IntoResponse {
    let service = PaymentService::new(state.db.clone());

    match service.create(&actor, input).await {
        Ok(payment) => (StatusCode::CREATED, Json(payment)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn verify_payment(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(payment_id): Path<Uuid>,
    Json(input): Json<VerifyPaymentRequest>,
) -> impl IntoResponse {
    let service = PaymentService::new(state.db.clone());

    match service.verify(&actor, payment_id, input).await {
        Ok(payment) => (StatusCode::OK, Json(payment)).into_response(),
        Err(e) => e.into_response(),
    }
}
