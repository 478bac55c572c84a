//! Authentication middleware
//!
//! JWT authentication and role-based access control

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::errors::ErrorKind;
use shared::Role;
use uuid::Uuid;

use crate::error::{AppError, AppResult, ErrorDetail, ErrorResponse};
use crate::services::auth::Claims;
use crate::AppState;

/// The user behind a request, passed explicitly into every service call
#[derive(Clone, Debug)]
pub struct Actor {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    /// Client address: first X-Forwarded-For hop, else the socket peer
    pub origin: Option<String>,
}

impl Actor {
    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }

    /// Require admin or staff
    pub fn require_privileged(&self) -> AppResult<()> {
        if self.is_privileged() {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions)
        }
    }

    pub fn require_role(&self, role: Role) -> AppResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions)
        }
    }

    /// Buyers only see their own records; privileged users see all
    pub fn buyer_scope(&self) -> Option<Uuid> {
        (!self.is_privileged()).then_some(self.user_id)
    }
}

/// Authentication middleware that validates JWT tokens against the
/// configured secret and attaches the [`Actor`] to the request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(request.headers()) {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let claims = match decode_jwt(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid user ID in token"),
    };
    let role = match claims.role.parse::<Role>() {
        Ok(role) => role,
        Err(_) => return unauthorized_response("Invalid role in token"),
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let origin = forwarded_for(request.headers()).or(peer);

    let actor = Actor {
        user_id,
        username: claims.username,
        role,
        origin,
    };
    tracing::debug!(user_id = %actor.user_id, role = %actor.role, "authenticated request");

    request.extensions_mut().insert(actor);

    next.run(request).await
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// First hop of X-Forwarded-For, if present
pub fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> AppResult<Claims> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail::new("UNAUTHORIZED", message, "Tidak memiliki otorisasi"),
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current actor
#[derive(Clone, Debug)]
pub struct CurrentUser(pub Actor);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: ErrorDetail::new(
                        "UNAUTHORIZED",
                        "Authentication required",
                        "Silakan login terlebih dahulu",
                    ),
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}

/// Client address for unauthenticated endpoints (login, register)
#[derive(Clone, Debug)]
pub struct ClientOrigin(pub Option<String>);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for ClientOrigin
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(ClientOrigin(forwarded_for(&parts.headers).or(peer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn actor(role: Role) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            username: "tester".into(),
            role,
            origin: None,
        }
    }

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(forwarded_for(&headers).as_deref(), Some("203.0.113.7"));
        assert_eq!(forwarded_for(&HeaderMap::new()), None);
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_role_guards() {
        assert!(actor(Role::Admin).require_privileged().is_ok());
        assert!(actor(Role::Staff).require_privileged().is_ok());
        assert!(actor(Role::Buyer).require_privileged().is_err());
        assert!(actor(Role::Buyer).require_role(Role::Buyer).is_ok());
        assert!(actor(Role::Staff).buyer_scope().is_none());
        let buyer = actor(Role::Buyer);
        assert_eq!(buyer.buyer_scope(), Some(buyer.user_id));
    }
}
