//! Sales document handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::PageQuery;
use crate::middleware::CurrentUser;
use crate::services::document::DocumentFilter;
use crate::services::DocumentService;
use crate::AppState;

pub async fn list_documents(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(page): Query<PageQuery>,
    Query(filter): Query<DocumentFilter>,
) -> impl IntoResponse {
    let service = DocumentService::new(state.db.clone());
    let pagination = page.resolve(&state.config.business);

    match service.list(&actor, &filter, &pagination).await {
        Ok(documents) => (StatusCode::OK, Json(documents)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_document(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(document_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = DocumentService::new(state.db.clone());

    match service.get(&actor, document_id).await {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(e) => e.into_response(),
    }
}
