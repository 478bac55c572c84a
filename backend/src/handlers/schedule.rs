//! Pickup schedule handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::NewSchedule;

use super::PageQuery;
use crate::middleware::CurrentUser;
use crate::services::schedule::ScheduleFilter;
use crate::services::ScheduleService;
use crate::AppState;

pub async fn list_schedules(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(page): Query<PageQuery>,
    Query(filter): Query<ScheduleFilter>,
) -> impl IntoResponse {
    let service = ScheduleService::new(state.db.clone());
    let pagination = page.resolve(&state.config.business);

    match service.list(&actor, &filter, &pagination).await {
        Ok(schedules) => (StatusCode::OK, Json(schedules)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn create_schedule(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<NewSchedule>,
) -> impl IntoResponse {
    let service = ScheduleService::new(state.db.clone());

    match service.create(&actor, input).await {
        Ok(schedule) => (StatusCode::CREATED, Json(schedule)).into_response(),
        Err(e) => e.into_response(),
    }
}
