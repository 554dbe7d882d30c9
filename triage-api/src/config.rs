/// Configuration management for the API server
///
/// Configuration comes from environment variables (a `.env` file is loaded
/// first when present):
///
/// | variable                   | default            | notes                                |
/// |----------------------------|--------------------|--------------------------------------|
/// | `API_HOST`                 | `0.0.0.0`          |                                      |
/// | `API_PORT`                 | `8080`             |                                      |
/// | `CORS_ORIGINS`             | `*`                | comma-separated                      |
/// | `ENVIRONMENT`              | `development`      | `production` enables HSTS            |
/// | `DATABASE_URL`             | required           |                                      |
/// | `DATABASE_MAX_CONNECTIONS` | `10`               |                                      |
/// | `JWT_SECRET`               | required           | at least 32 characters               |
/// | `REDIS_URL`                | unset              | enables the realtime change feed     |
/// | `MAX_SNOOZES`              | `5`                | snoozes allowed per event            |
/// | `SLA_BREACH_RISK_MINUTES`  | `20`               |                                      |
/// | `DEV_AUTH_BYPASS`          | `false`            | debug builds outside production only |
/// | `DEV_USER_ID`              | unset              | user served when bypassing auth      |
/// | `LOG_FORMAT`               | `pretty`           | `json` for structured output         |
///
/// # Example
///
/// ```no_run
/// use triage_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Listening on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::collections::HashMap;
use std::env;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use triage_shared::escalation::{LifecyclePolicy, DEFAULT_BREACH_RISK_MINUTES, DEFAULT_MAX_SNOOZES};
use uuid::Uuid;

/// Minimum accepted `JWT_SECRET` length
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,

    /// Redis URL for the change feed; `None` disables it
    pub redis_url: Option<String>,

    pub lifecycle: LifecycleConfig,
    pub dev: DevConfig,
    pub log_format: LogFormat,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Deployment environment name
    pub environment: String,
}

impl ApiConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Session token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

/// Escalation lifecycle tunables
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LifecycleConfig {
    pub max_snoozes: i32,
    pub sla_breach_risk_minutes: i64,
}

impl LifecycleConfig {
    pub fn policy(&self) -> LifecyclePolicy {
        LifecyclePolicy {
            max_snoozes: self.max_snoozes,
            breach_risk_window: Duration::minutes(self.sla_breach_risk_minutes),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_snoozes: DEFAULT_MAX_SNOOZES,
            sla_breach_risk_minutes: DEFAULT_BREACH_RISK_MINUTES,
        }
    }
}

/// Local development shortcuts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevConfig {
    pub auth_bypass: bool,
    pub user_id: Option<Uuid>,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value
    /// doesn't parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration from a map of variables
    pub fn from_map(vars: &HashMap<String, String>) -> anyhow::Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port = var("API_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("API_PORT is invalid: {}", e))?;

        let cors_origins = var("CORS_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = var("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS is invalid: {}", e))?;

        let jwt_secret = get("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            anyhow::bail!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        let max_snoozes = var("MAX_SNOOZES", &DEFAULT_MAX_SNOOZES.to_string())
            .parse::<i32>()
            .map_err(|e| anyhow::anyhow!("MAX_SNOOZES is invalid: {}", e))?;
        if max_snoozes < 0 {
            anyhow::bail!("MAX_SNOOZES must not be negative");
        }

        let sla_breach_risk_minutes =
            var("SLA_BREACH_RISK_MINUTES", &DEFAULT_BREACH_RISK_MINUTES.to_string())
                .parse::<i64>()
                .map_err(|e| anyhow::anyhow!("SLA_BREACH_RISK_MINUTES is invalid: {}", e))?;
        if !(0..=24 * 60).contains(&sla_breach_risk_minutes) {
            anyhow::bail!("SLA_BREACH_RISK_MINUTES must be between 0 and 1440");
        }

        let auth_bypass = parse_bool(&var("DEV_AUTH_BYPASS", "false"));
        let dev_user_id = get("DEV_USER_ID")
            .filter(|s| !s.trim().is_empty())
            .map(|s| Uuid::parse_str(s.trim()))
            .transpose()
            .map_err(|e| anyhow::anyhow!("DEV_USER_ID is invalid: {}", e))?;

        let log_format = match var("LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            api: ApiConfig {
                host: var("API_HOST", "0.0.0.0"),
                port,
                cors_origins,
                environment: var("ENVIRONMENT", "development"),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            redis_url: get("REDIS_URL").filter(|s| !s.trim().is_empty()),
            lifecycle: LifecycleConfig {
                max_snoozes,
                sla_breach_risk_minutes,
            },
            dev: DevConfig {
                auth_bypass,
                user_id: dev_user_id,
            },
            log_format,
        })
    }

    /// Socket address to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// User to serve unauthenticated requests as, if the dev bypass is on
    ///
    /// Always `None` in release builds and in production.
    pub fn dev_bypass_user(&self) -> Option<Uuid> {
        if cfg!(debug_assertions) && self.dev.auth_bypass && !self.api.is_production() {
            self.dev.user_id
        } else {
            None
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
