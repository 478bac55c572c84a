//! Authentication service for registration, login and profiles

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use shared::{
    ActivityCode, LoginRequest, RegisterRequest, Role, UpdateProfileRequest, User, UserStatus,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::activity;
use crate::config::{BootstrapAdminConfig, Config};
use crate::error::{AppError, AppResult};
use crate::middleware::Actor;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub username: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Token and profile returned by a successful login
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    company_name: Option<String>,
    address: Option<String>,
    nib: Option<String>,
    phone: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            role: row.role.parse().map_err(|e| AppError::corrupt("user role", e))?,
            company_name: row.company_name,
            address: row.address,
            nib: row.nib,
            phone: row.phone,
            status: row.status.parse().map_err(|e| AppError::corrupt("user status", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, company_name, address, \
     nib, phone, status, created_at, updated_at";

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Map a unique-constraint violation to a duplicate-entry error
fn duplicate_or(err: sqlx::Error, what: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::DuplicateEntry(what.to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
        }
    }

    /// Register a buyer account
    pub async fn register(
        &self,
        input: RegisterRequest,
        origin: Option<&str>,
    ) -> AppResult<User> {
        let email = input.email.trim().to_lowercase();
        let username = input.username.trim().to_string();

        let taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE email = $1 OR username = $2",
        )
        .bind(&email)
        .bind(&username)
        .fetch_one(&self.db)
        .await?;
        if taken > 0 {
            return Err(AppError::DuplicateEntry("email or username".to_string()));
        }

        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, company_name, address,
                               nib, phone, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&username)
        .bind(&email)
        .bind(&password_hash)
        .bind(Role::Buyer.as_str())
        .bind(input.company_name.trim())
        .bind(non_blank(input.address))
        .bind(non_blank(input.nib))
        .bind(non_blank(input.phone))
        .bind(UserStatus::Active.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| duplicate_or(e, "email or username"))?;

        let user = User::try_from(row)?;

        activity::record_for(
            &mut *tx,
            Some((user.id, user.role)),
            origin,
            ActivityCode::Registered,
            Some(user.id),
            format!("buyer {} registered", user.username),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, username = %user.username, "buyer registered");
        Ok(user)
    }

    /// Authenticate with email and password
    pub async fn login(&self, input: LoginRequest, origin: Option<&str>) -> AppResult<LoginResponse> {
        let email = input.email.trim().to_lowercase();

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(&email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        let valid = verify(&input.password, &row.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            tracing::warn!(%email, "failed login attempt");
            return Err(AppError::InvalidCredentials);
        }

        let user = User::try_from(row)?;
        if user.status != UserStatus::Active {
            return Err(AppError::AccountInactive);
        }

        let mut tx = self.db.begin().await?;
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
        activity::record_for(
            &mut *tx,
            Some((user.id, user.role)),
            origin,
            ActivityCode::Login,
            Some(user.id),
            format!("{} logged in", user.username),
        )
        .await?;
        tx.commit().await?;

        let access_token = self.generate_token(&user)?;

        tracing::info!(user_id = %user.id, role = %user.role, "user logged in");
        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
            user,
        })
    }

    pub async fn get_profile(&self, actor: &Actor) -> AppResult<User> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(actor.user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))?
            .try_into()
    }

    /// Update the caller's own profile; absent fields keep their value
    pub async fn update_profile(
        &self,
        actor: &Actor,
        input: UpdateProfileRequest,
    ) -> AppResult<User> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET company_name = COALESCE($2, company_name),
                address = COALESCE($3, address),
                phone = COALESCE($4, phone),
                nib = COALESCE($5, nib),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(actor.user_id)
        .bind(non_blank(input.company_name))
        .bind(non_blank(input.address))
        .bind(non_blank(input.phone))
        .bind(non_blank(input.nib))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        activity::record(
            &mut *tx,
            actor,
            ActivityCode::ProfileUpdated,
            Some(actor.user_id),
            "profile updated",
        )
        .await?;
        tx.commit().await?;

        row.try_into()
    }

    /// Create the configured admin account when no admin exists yet
    pub async fn ensure_bootstrap_admin(&self, admin: &BootstrapAdminConfig) -> AppResult<()> {
        let admins = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&self.db)
            .await?;
        if admins > 0 {
            tracing::debug!("admin account present, skipping bootstrap");
            return Ok(());
        }

        if admin.password.len() < 6 {
            return Err(AppError::Configuration(
                "bootstrap_admin.password must be at least 6 characters".to_string(),
            ));
        }
        let password_hash = hash(&admin.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, status)
            VALUES ($1, $2, $3, $4, 'admin', 'active')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(admin.username.trim())
        .bind(admin.email.trim().to_lowercase())
        .bind(&password_hash)
        .execute(&self.db)
        .await
        .map_err(|e| duplicate_or(e, "bootstrap admin email or username"))?;

        tracing::info!(username = %admin.username, "bootstrap admin account created");
        Ok(())
    }

    fn generate_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.as_str().to_string(),
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_blank_trims_and_drops_empty() {
        assert_eq!(non_blank(Some("  PT Sawit  ".into())), Some("PT Sawit".into()));
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(None), None);
    }
}
