/// Server configuration
///
/// Read from the process environment after loading `.env` when one exists.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `API_PRODUCTION`: enables HSTS on responses (default: false)
/// - `CORS_ORIGINS`: comma-separated origins, `*` for any (default: *)
/// - `JWT_SECRET`: Secret key for JWT signing (required, at least 32 characters)
/// - `JWT_TTL_HOURS`: token lifetime (default: 24)
/// - `ROLE_REQUEST_POLICY`: `downgrade` or `reject` (default: downgrade)
/// - `LOG_FORMAT`: `pretty` or `json` (default: pretty)
/// - `BOOTSTRAP_ADMIN_EMAIL` / `BOOTSTRAP_ADMIN_PASSWORD` / `BOOTSTRAP_ADMIN_NAME`:
///   account created at startup when no admin exists
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use teamboard_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// assert!(config.jwt.secret.len() >= 32);
/// # Ok(())
/// # }
/// ```

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use teamboard_shared::auth::authorization::RoleRequestPolicy;
use teamboard_shared::services::users::BootstrapAdmin;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode adds `Strict-Transport-Security`
    pub production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Token signing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HS256 key, at least 32 characters (`openssl rand -hex 32`)
    #[serde(skip_serializing)]
    pub secret: String,

    /// Token lifetime in hours
    pub ttl_hours: i64,
}

/// Account and registration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// What to do when a non-admin asks to register as admin
    pub role_request_policy: RoleRequestPolicy,

    /// Seed admin, used only while no admin exists
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdminConfig {
    pub name: String,
    pub email: String,

    #[serde(skip_serializing)]
    pub password: String,
}

impl From<&BootstrapAdminConfig> for BootstrapAdmin {
    fn from(seed: &BootstrapAdminConfig) -> Self {
        BootstrapAdmin {
            name: seed.name.clone(),
            email: seed.email.clone(),
            password: seed.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,

    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "plain" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => bail!("expected 'pretty' or 'json', got '{}'", other),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Fails when `DATABASE_URL` or `JWT_SECRET` is missing, a value does not
    /// parse, or only part of the `BOOTSTRAP_ADMIN_*` set is given.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let secret = required("JWT_SECRET")?;
        if secret.len() < 32 {
            bail!("JWT_SECRET must be at least 32 characters long");
        }

        let ttl_hours: i64 = parsed("JWT_TTL_HOURS", 24)?;
        if ttl_hours <= 0 {
            bail!("JWT_TTL_HOURS must be positive");
        }

        Ok(Self {
            api: ApiConfig {
                host: var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parsed("API_PORT", 8080)?,
                cors_origins: parse_origins(&var("CORS_ORIGINS").unwrap_or_else(|| "*".to_string())),
                production: flag("API_PRODUCTION"),
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: parsed("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            jwt: JwtConfig { secret, ttl_hours },
            auth: AuthConfig {
                role_request_policy: parsed("ROLE_REQUEST_POLICY", RoleRequestPolicy::Downgrade)?,
                bootstrap_admin: bootstrap_admin_from_env()?,
            },
            logging: LoggingConfig {
                format: parsed("LOG_FORMAT", LogFormat::Pretty)?,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Token lifetime as a `chrono` duration
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.jwt.ttl_hours)
    }

    /// True when any origin may call the API
    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

/// Non-empty, trimmed value of `key`
fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(key: &str) -> anyhow::Result<String> {
    var(key).with_context(|| format!("{} environment variable is required", key))
}

fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{}: invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn flag(key: &str) -> bool {
    var(key).is_some_and(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
}

fn bootstrap_admin_from_env() -> anyhow::Result<Option<BootstrapAdminConfig>> {
    let seed = match (var("BOOTSTRAP_ADMIN_EMAIL"), var("BOOTSTRAP_ADMIN_PASSWORD")) {
        (None, None) => return Ok(None),
        (Some(email), Some(password)) => BootstrapAdminConfig {
            name: var("BOOTSTRAP_ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
            email,
            password,
        },
        _ => bail!("BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"),
    };

    if seed.password.len() < 8 {
        bail!("BOOTSTRAP_ADMIN_PASSWORD must be at least 8 characters long");
    }
    Ok(Some(seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/test".to_string(),
                max_connections: 10,
            },
            jwt: JwtConfig {
                secret: "test-secret-key-at-least-32-bytes-long".to_string(),
                ttl_hours: 24,
            },
            auth: AuthConfig {
                role_request_policy: RoleRequestPolicy::Downgrade,
                bootstrap_admin: None,
            },
            logging: LoggingConfig {
                format: LogFormat::Pretty,
            },
        }
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(sample().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_token_ttl() {
        assert_eq!(sample().token_ttl(), chrono::Duration::hours(24));
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(" https://a.example , https://b.example,,"),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );

        let mut config = sample();
        assert!(config.allows_any_origin());
        config.api.cors_origins = parse_origins("https://a.example");
        assert!(!config.allows_any_origin());
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_parsed_uses_default_when_unset() {
        let port: u16 = parsed("TEAMBOARD_TEST_UNSET_PORT", 8080).unwrap();
        assert_eq!(port, 8080);
        assert!(!flag("TEAMBOARD_TEST_UNSET_FLAG"));
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut config = sample();
        config.auth.bootstrap_admin = Some(BootstrapAdminConfig {
            name: "Root".to_string(),
            email: "root@example.com".to_string(),
            password: "super-secret-password".to_string(),
        });

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("test-secret-key"));
        assert!(!json.contains("super-secret-password"));
    }
}
