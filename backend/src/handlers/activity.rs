//! Activity log handlers

use axum::{
    extract::{Query, State},
    Json,
};
use shared::{ActivityLogEntry, ActivityStatistics, PaginatedResponse};

use super::PageQuery;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::activity::ActivityFilter;
use crate::services::reporting::ReportFilter;
use crate::services::ActivityService;
use crate::AppState;

pub async fn list_logs(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(page): Query<PageQuery>,
    Query(filter): Query<ActivityFilter>,
) -> Result<Json<PaginatedResponse<ActivityLogEntry>>, AppError> {
    actor.require_privileged()?;

    let service = ActivityService::new(state.db.clone());
    let pagination = page.resolve(&state.config.business);
    let offset_hours = state.config.business.utc_offset_hours;

    Ok(Json(service.list(&filter, &pagination, offset_hours).await?))
}

/// Per-activity counts and the most active users
pub async fn log_statistics(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(filter): Query<ReportFilter>,
) -> Result<Json<ActivityStatistics>, AppError> {
    actor.require_privileged()?;

    let service = ActivityService::new(state.db.clone());
    let business = &state.config.business;
    let range = filter.range(business.today())?;

    Ok(Json(service.statistics(range, business.utc_offset_hours).await?))
}
