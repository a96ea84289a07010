use serde::{Deserialize, Serialize};
use std::env;

/// Upper bound for session lifetime, one year.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

/// Session lifetime in whole hours, within `1..=MAX_TOKEN_TTL_HOURS`.
fn parse_token_ttl(raw: &str) -> Option<i64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|hours| (1..=MAX_TOKEN_TTL_HOURS).contains(hours))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub consistency: ConsistencyConfig,
    pub payments: PaymentConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    /// Full connection string. When absent it is built from `DB_USER`/`DB_PASS`/`DB_HOST`.
    pub uri: Option<String>,
    pub host: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: String,
    pub app_name: String,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// Adds `Secure` to the session cookie.
    pub secure_cookies: bool,
    /// `SameSite=None` instead of `SameSite=Strict`.
    pub cross_site_cookies: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationUniqueness {
    /// Unique compound index, duplicate-key failures become conflicts.
    Atomic,
    /// Read-before-write. Two concurrent identical submissions can both succeed.
    CheckThenInsert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyConfig {
    pub application_uniqueness: ApplicationUniqueness,
    /// Updating a scholarship id that does not exist creates it.
    pub scholarship_update_upsert: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub api_base: String,
    pub currency: String,
    pub timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let raw = env::var("APP_ENV").or_else(|_| env::var("NODE_ENV"));
        let environment = match raw.as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database
        if let Ok(v) = env::var("DATABASE_BACKEND") {
            self.database.backend = match v.to_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "mongo" | "mongodb" => StoreBackend::Mongo,
                _ => self.database.backend,
            };
        }
        if let Ok(v) = env::var("MONGODB_URI") {
            self.database.uri = Some(v);
        }
        if let Ok(v) = env::var("DB_HOST") {
            self.database.host = v;
        }
        if let Ok(v) = env::var("DB_USER") {
            self.database.user = Some(v);
        }
        if let Ok(v) = env::var("DB_PASS") {
            self.database.password = Some(v);
        }
        if let Ok(v) = env::var("DB_NAME") {
            self.database.name = v;
        }
        if let Ok(v) = env::var("DB_CONNECT_TIMEOUT_SECS") {
            self.database.connect_timeout_secs = v.parse().unwrap_or(self.database.connect_timeout_secs);
        }

        // Security
        if let Ok(v) = env::var("SECRET_KEY") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("TOKEN_TTL_HOURS") {
            match parse_token_ttl(&v) {
                Some(hours) => self.security.token_ttl_hours = hours,
                None => tracing::warn!(
                    "Ignoring TOKEN_TTL_HOURS={:?}, expected 1..={}",
                    v,
                    MAX_TOKEN_TTL_HOURS
                ),
            }
        }
        if let Ok(v) = env::var("SECURE_COOKIES") {
            self.security.secure_cookies = v.parse().unwrap_or(self.security.secure_cookies);
        }
        if let Ok(v) = env::var("CROSS_SITE_COOKIES") {
            self.security.cross_site_cookies = v.parse().unwrap_or(self.security.cross_site_cookies);
        }
        if let Ok(v) = env::var("CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Consistency
        if let Ok(v) = env::var("APPLICATION_UNIQUENESS") {
            self.consistency.application_uniqueness = match v.to_lowercase().as_str() {
                "check_then_insert" | "legacy" => ApplicationUniqueness::CheckThenInsert,
                "atomic" => ApplicationUniqueness::Atomic,
                _ => self.consistency.application_uniqueness,
            };
        }
        if let Ok(v) = env::var("SCHOLARSHIP_UPDATE_UPSERT") {
            self.consistency.scholarship_update_upsert =
                v.parse().unwrap_or(self.consistency.scholarship_update_upsert);
        }

        // Payments
        if let Ok(v) = env::var("PAYMENT_SECRET_KEY").or_else(|_| env::var("STRIPE_SECRET_KEY")) {
            self.payments.secret_key = v;
        }
        if let Ok(v) = env::var("PAYMENT_API_BASE") {
            self.payments.api_base = v;
        }
        if let Ok(v) = env::var("PAYMENT_CURRENCY") {
            self.payments.currency = v;
        }
        if let Ok(v) = env::var("PAYMENT_TIMEOUT_SECS") {
            self.payments.timeout_secs = v.parse().unwrap_or(self.payments.timeout_secs);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Mongo,
                uri: None,
                host: "cluster0.cy3cu.mongodb.net".to_string(),
                user: None,
                password: None,
                name: "scholarshipDB".to_string(),
                app_name: "Cluster0".to_string(),
                connect_timeout_secs: 10,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                token_ttl_hours: 3,
                secure_cookies: false,
                cross_site_cookies: false,
                cors_origins: vec!["http://localhost:5173".to_string()],
            },
            consistency: ConsistencyConfig {
                application_uniqueness: ApplicationUniqueness::Atomic,
                scholarship_update_upsert: true,
            },
            payments: PaymentConfig {
                secret_key: String::new(),
                api_base: "https://api.stripe.com".to_string(),
                currency: "usd".to_string(),
                timeout_secs: 15,
            },
        }
    }

    pub fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.connect_timeout_secs = 5;
        config
    }

    pub fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.database.connect_timeout_secs = 5;
        config.security.secure_cookies = true;
        config.security.cross_site_cookies = true;
        config.payments.timeout_secs = 10;
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}
