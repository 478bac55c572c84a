//! Configuration management for the TBS trading platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with SAWIT__ prefix

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::GradeAdjustmentPolicy;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Log output format: "pretty" or "json"
    pub log_format: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Trading rules configuration
    pub business: BusinessConfig,

    /// First admin account, created at start-up when no admin exists
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,

    /// Run migrations at start-up outside development
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessConfig {
    /// Offset of local business time from UTC (WIB = +7)
    pub utc_offset_hours: i32,

    /// Currency code for money amounts
    pub currency: String,

    pub grade_b_discount_percent: Decimal,

    pub grade_c_discount_percent: Decimal,

    pub default_page_size: u32,

    pub max_page_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BootstrapAdminConfig {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl BusinessConfig {
    pub fn grade_policy(&self) -> GradeAdjustmentPolicy {
        GradeAdjustmentPolicy {
            grade_b_discount_percent: self.grade_b_discount_percent,
            grade_c_discount_percent: self.grade_c_discount_percent,
        }
    }

    /// Fixed offset of business-local time
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }

    /// Today's date in business-local time
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset()).date_naive()
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("SAWIT_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("log_format", "pretty")?
            .set_default("server.port", 8080)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.run_migrations", false)?
            .set_default("jwt.access_token_expiry", 86400)?
            .set_default("business.utc_offset_hours", 7)?
            .set_default("business.currency", "IDR")?
            .set_default("business.grade_b_discount_percent", "10")?
            .set_default("business.grade_c_discount_percent", "20")?
            .set_default("business.default_page_size", 20)?
            .set_default("business.max_page_size", 100)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (SAWIT__ prefix)
            .add_source(
                Environment::with_prefix("SAWIT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn should_run_migrations(&self) -> bool {
        self.environment == "development" || self.database.run_migrations
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 7,
            currency: "IDR".to_string(),
            grade_b_discount_percent: Decimal::from(10),
            grade_c_discount_percent: Decimal::from(20),
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}
