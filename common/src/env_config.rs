use std::{env, str::FromStr, sync::Arc, time::Duration};

#[derive(Clone, Debug)]
/// Configuration struct for the server.
///
/// This struct holds all the necessary configuration parameters
/// required to initialize and run the server: the optional document store
/// connection, JWT settings, API key issuing rules, server host and port,
/// number of worker threads, CORS settings and logging preferences.
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// The URL of the document store database. `None` runs on the in-memory index only.
    pub database_url: Option<String>,
    /// Upper bound for every document store call, liveness probe included.
    pub document_store_timeout: Duration,
    /// Configuration for JWT (JSON Web Token) authentication.
    pub jwt_config: JwtConfig,
    /// Rules for issuing and accepting API keys.
    pub api_key_config: ApiKeyConfig,
    /// The hostname or IP address the server will bind to.
    pub server_host: String,
    /// The port number the server will listen on.
    pub server_port: u16,
    /// The number of worker threads to spawn for handling requests.
    pub num_workers: usize,
    /// The allowed origin for CORS (Cross-Origin Resource Sharing).
    pub cors_allowed_origin: String,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    /// File the logger mirrors console output into.
    pub log_file: String,
}

#[derive(Clone, Debug)]
/// Configuration for JSON Web Token (JWT) authentication.
///
/// This struct contains the secret key used to sign JWTs and
/// the expiration time in minutes for issued tokens.
pub struct JwtConfig {
    /// The secret key used to sign and verify JWTs.
    pub secret: String,
    /// The expiration time for JWTs in minutes.
    pub expiration_minutes: i64,
}

#[derive(Clone, Debug)]
pub struct ApiKeyConfig {
    /// Fixed prefix every issued key starts with.
    pub prefix: String,
    /// Length of the random part of issued keys.
    pub length: usize,
    /// Longest `X-API-Key` header value the request gate will look at.
    pub max_header_length: usize,
}

impl Default for ApiKeyConfig {
    fn default() -> Self {
        ApiKeyConfig {
            prefix: "LUNAR_".to_string(),
            length: 32,
            max_header_length: 256,
        }
    }
}

impl JwtConfig {
    /// Creates a new `JwtConfig` instance from environment variables.
    ///
    /// - `JWT_SECRET`: Required. The secret key for JWT signing.
    /// - `JWT_EXPIRATION_MINUTES`: Optional. Defaults to 60 minutes.
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        JwtConfig {
            secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            expiration_minutes: env_or("JWT_EXPIRATION_MINUTES", 60),
        }
    }
}

impl ApiKeyConfig {
    pub fn from_env() -> Self {
        let defaults = ApiKeyConfig::default();

        ApiKeyConfig {
            prefix: env::var("API_KEY_PREFIX").unwrap_or(defaults.prefix),
            length: env_or("API_KEY_LENGTH", defaults.length),
            max_header_length: env_or("API_KEY_MAX_HEADER_LENGTH", defaults.max_header_length),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// # Environment Variables
    ///
    /// Required:
    /// - `JWT_SECRET`: Secret key for JWT signing (via `JwtConfig::from_env()`)
    ///
    /// Optional (with defaults):
    /// - `ENVIRONMENT`: "development" or "production" (default: "development")
    /// - `DATABASE_URL`: Document store connection string (default: none, in-memory only)
    /// - `DOCUMENT_STORE_TIMEOUT_MS`: Per-call document store timeout (default: 3000)
    /// - `API_KEY_PREFIX`, `API_KEY_LENGTH`, `API_KEY_MAX_HEADER_LENGTH`
    /// - `IP`: Server host (default: "0.0.0.0")
    /// - `PORT`: Server port (default: 3001)
    /// - `WORKERS`: Number of worker threads (default: 4)
    /// - `CORS_ALLOWED_ORIGIN`: Allowed CORS origin (default: "http://localhost:3000")
    /// - `ENABLE_CONSOLE_LOGGING`: Whether to enable console logging (default: true)
    /// - `LOG_FILE`: Log file path (default: "server.log")
    ///
    /// Numeric values that cannot be parsed fall back to their defaults.
    pub fn from_env() -> Arc<Self> {
        dotenvy::dotenv().ok();

        Arc::new(Config {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            document_store_timeout: Duration::from_millis(env_or(
                "DOCUMENT_STORE_TIMEOUT_MS",
                3000,
            )),
            jwt_config: JwtConfig::from_env(),
            api_key_config: ApiKeyConfig::from_env(),
            server_host: env::var("IP").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env_or("PORT", 3001),
            num_workers: env_or("WORKERS", 4),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            console_logging_enabled: env::var("ENABLE_CONSOLE_LOGGING")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                == "true",
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "server.log".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
