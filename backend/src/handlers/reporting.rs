//! Reporting handlers

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::reporting::{DailySalesReport, DashboardMetrics, ReportFilter};
use crate::services::ReportingService;
use crate::AppState;

/// Daily sales in a date range (default: last 30 days)
pub async fn daily_sales(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(filter): Query<ReportFilter>,
) -> Result<Json<Vec<DailySalesReport>>, AppError> {
    let service = ReportingService::new(state.db.clone());
    let range = filter.range(state.config.business.today())?;

    Ok(Json(service.daily_sales(&actor, range).await?))
}

pub async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> Result<Json<DashboardMetrics>, AppError> {
    let service = ReportingService::new(state.db.clone());

    Ok(Json(service.dashboard(&actor, state.config.business.today()).await?))
}
