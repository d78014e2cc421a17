/// Configuration management for the API server
///
/// Values come from the process environment (after loading `.env` when
/// present) through the `config` crate, with defaults for everything but the
/// secrets.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `STORE_BACKEND`: `postgres` or `memory` (default: postgres)
/// - `DATABASE_URL`: PostgreSQL connection string (required for postgres)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Secret key for JWT signing, at least 32 characters (required)
/// - `JWT_TTL_HOURS`: Session lifetime (default: 12)
/// - `BOOTSTRAP_ADMIN_PASSWORD`: Seeds the `admin` account into an empty store
///
/// # Example
///
/// ```no_run
/// use workshop_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use config::Environment;
use serde::{Deserialize, Serialize};

/// Minimum JWT secret length, in bytes
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Longest session lifetime accepted, one year
pub const MAX_JWT_TTL_HOURS: i64 = 24 * 365;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub store: StoreBackend,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,

    /// Password for the seeded `admin` account; unset disables seeding
    #[serde(skip_serializing)]
    pub bootstrap_admin_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

/// Where accounts and the audit trail live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    /// Process-local, lost on restart
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: Option<String>,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,

    pub ttl_hours: i64,
}

/// Flat view of the environment, one field per variable
#[derive(Debug, Deserialize)]
struct EnvSettings {
    api_host: String,
    api_port: u16,
    cors_origins: String,
    store_backend: StoreBackend,
    database_url: Option<String>,
    database_max_connections: u32,
    jwt_secret: Option<String>,
    jwt_ttl_hours: i64,
    bootstrap_admin_password: Option<String>,
}

impl Config {
    /// Loads configuration from `.env` and the process environment
    ///
    /// # Errors
    ///
    /// Fails when a required variable is missing, a value does not parse,
    /// or the JWT secret is too short.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::load(Environment::default())
    }

    /// Loads configuration from an explicit environment source
    pub fn load(environment: Environment) -> anyhow::Result<Self> {
        let settings: EnvSettings = config::Config::builder()
            .set_default("api_host", "0.0.0.0")?
            .set_default("api_port", 8080)?
            .set_default("cors_origins", "*")?
            .set_default("store_backend", "postgres")?
            .set_default("database_max_connections", 10)?
            .set_default("jwt_ttl_hours", 12)?
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()?;

        let jwt_secret = settings
            .jwt_secret
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} characters long", MIN_JWT_SECRET_LEN);
        }
        if !(1..=MAX_JWT_TTL_HOURS).contains(&settings.jwt_ttl_hours) {
            anyhow::bail!("JWT_TTL_HOURS must be between 1 and {}", MAX_JWT_TTL_HOURS);
        }

        let database_url = settings.database_url.filter(|url| !url.trim().is_empty());
        if settings.store_backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL environment variable is required");
        }

        let cors_origins = settings
            .cors_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            api: ApiConfig {
                host: settings.api_host,
                port: settings.api_port,
                cors_origins,
            },
            store: settings.store_backend,
            database: DatabaseConfig {
                url: database_url,
                max_connections: settings.database_max_connections,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                ttl_hours: settings.jwt_ttl_hours,
            },
            bootstrap_admin_password: settings
                .bootstrap_admin_password
                .filter(|p| !p.is_empty()),
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Whether any origin may call the API
    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.is_empty() || self.api.cors_origins.iter().any(|o| o == "*")
    }
}
