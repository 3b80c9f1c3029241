use std::env;

/// Upper bound on `JWT_TTL_HOURS`, one year.
const MAX_JWT_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_ttl_hours: ttl_hours(env::var("JWT_TTL_HOURS").ok()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or(env::var("PORT").ok(), 3000),
            db_max_connections: parse_or(env::var("DB_MAX_CONNECTIONS").ok(), 20),
            allowed_origins: split_origins(
                &env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string()),
            ),
        })
    }

    pub fn session_ttl_seconds(&self) -> usize {
        usize::try_from(self.jwt_ttl_hours.max(1).saturating_mul(3600)).unwrap_or(usize::MAX)
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn ttl_hours(value: Option<String>) -> i64 {
    parse_or(value, 24).clamp(1, MAX_JWT_TTL_HOURS)
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
