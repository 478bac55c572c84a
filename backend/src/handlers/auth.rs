//! Authentication and profile handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use shared::{LoginRequest, RegisterRequest, UpdateProfileRequest, User};
use validator::Validate;

use crate::error::AppError;
use crate::middleware::{ClientOrigin, CurrentUser};
use crate::services::auth::LoginResponse;
use crate::services::AuthService;
use crate::AppState;

/// Register endpoint handler
pub async fn register(
    State(state): State<AppState>,
    ClientOrigin(origin): ClientOrigin,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;

    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let user = auth_service.register(body, origin.as_deref()).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    ClientOrigin(origin): ClientOrigin,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    body.validate()?;

    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let response = auth_service.login(body, origin.as_deref()).await?;

    Ok(Json(response))
}

pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> Result<Json<User>, AppError> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    Ok(Json(auth_service.get_profile(&actor).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    body.validate()?;

    let auth_service = AuthService::new(state.db.clone(), &state.config);
    Ok(Json(auth_service.update_profile(&actor, body).await?))
}
