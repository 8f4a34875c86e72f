/// Configuration management for Billing Service
///
/// This module handles loading and managing configuration from environment
/// variables.
use block_core::{policy, BillingPolicy};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Block pricing and allowance policy
    pub billing: BillingPolicy,
    /// Payment gateway collaborator
    pub payment: PaymentGatewayConfig,
    /// Video host collaborator
    pub video_host: VideoHostConfig,
    /// Background job tuning
    pub jobs: JobsConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
}

/// Payment gateway collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentGatewayConfig {
    /// Gateway API base URL
    pub base_url: String,
    /// Bearer token for the gateway API
    pub api_key: String,
    /// Where the checkout UI sends the creator after payment
    pub return_url: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

/// Video host collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoHostConfig {
    /// Host API base URL
    pub base_url: String,
    /// Bearer token for the host API
    pub api_key: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

/// Background job tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Reservations in reserved/uploading older than this are reaped (minutes)
    pub stale_reservation_minutes: i64,
    /// Reaper cycle interval (seconds)
    pub reaper_interval_secs: u64,
    /// Pending purchases older than this are expired (hours)
    pub purchase_ttl_hours: i64,
    /// Purchase expirer cycle interval (seconds)
    pub expirer_interval_secs: u64,
    /// Promotional grant/sweep cycle interval (seconds)
    pub promo_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("BILLING_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("BILLING_SERVICE_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8086),
            },
            cors: {
                let allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
                    Ok(value) => value,
                    Err(_) if app_env.eq_ignore_ascii_case("production") => {
                        return Err("CORS_ALLOWED_ORIGINS must be set in production".to_string())
                    }
                    Err(_) => "http://localhost:3000".to_string(),
                };

                if app_env.eq_ignore_ascii_case("production") && allowed_origins.trim() == "*" {
                    return Err("CORS_ALLOWED_ORIGINS cannot be '*' in production".to_string());
                }

                CorsConfig { allowed_origins }
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/solstream".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(10),
            },
            billing: BillingPolicy {
                block_size_gb: parse_env_or_default(
                    "BILLING_BLOCK_SIZE_GB",
                    policy::BLOCK_SIZE_GB,
                )?,
                price_per_block_cents: std::env::var("BILLING_PRICE_PER_BLOCK_CENTS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(policy::PRICE_PER_BLOCK_CENTS),
                grace_months: std::env::var("BILLING_GRACE_MONTHS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(policy::GRACE_MONTHS),
                promo_expiry_days: std::env::var("BILLING_PROMO_EXPIRY_DAYS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(policy::PROMO_EXPIRY_DAYS),
                grace_grant_blocks: std::env::var("BILLING_GRACE_GRANT_BLOCKS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(policy::GRACE_GRANT_BLOCKS),
                promo_grant_blocks: std::env::var("BILLING_PROMO_GRANT_BLOCKS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(policy::PROMO_GRANT_BLOCKS),
            },
            payment: {
                let api_key = std::env::var("PAYMENT_GATEWAY_API_KEY").unwrap_or_default();
                if app_env.eq_ignore_ascii_case("production") && api_key.trim().is_empty() {
                    return Err(
                        "PAYMENT_GATEWAY_API_KEY must be set in production".to_string()
                    );
                }

                PaymentGatewayConfig {
                    base_url: std::env::var("PAYMENT_GATEWAY_URL")
                        .unwrap_or_else(|_| "http://localhost:9400".to_string()),
                    api_key,
                    return_url: std::env::var("PAYMENT_RETURN_URL")
                        .unwrap_or_else(|_| "http://localhost:3000/studio/blocks".to_string()),
                    request_timeout_ms: std::env::var("PAYMENT_GATEWAY_TIMEOUT_MS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(10_000),
                }
            },
            video_host: VideoHostConfig {
                base_url: std::env::var("VIDEO_HOST_URL")
                    .unwrap_or_else(|_| "http://localhost:9500".to_string()),
                api_key: std::env::var("VIDEO_HOST_API_KEY").unwrap_or_default(),
                request_timeout_ms: std::env::var("VIDEO_HOST_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10_000),
            },
            jobs: JobsConfig {
                stale_reservation_minutes: std::env::var("JOBS_STALE_RESERVATION_MINUTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
                reaper_interval_secs: std::env::var("JOBS_REAPER_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
                purchase_ttl_hours: std::env::var("JOBS_PURCHASE_TTL_HOURS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(24),
                expirer_interval_secs: std::env::var("JOBS_EXPIRER_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3_600),
                promo_interval_secs: std::env::var("JOBS_PROMO_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(6 * 3_600),
            },
        })
    }
}

fn parse_env_or_default(key: &str, default: f64) -> Result<f64, String> {
    match std::env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}
