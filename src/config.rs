use std::env;

use actix_web::http::{header::HeaderValue, Uri};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set when DATABASE_URL is configured")]
    Missing(&'static str),

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    /// `*` alone allows any origin. A list must hold absolute origins such
    /// as `https://pecanozap.com.br`.
    fn parse(raw: Option<&str>) -> Result<Self, ConfigError> {
        let list = match raw.map(str::trim) {
            None | Some("") | Some("*") => return Ok(Self::Any),
            Some(list) => list,
        };

        list.split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(|origin| {
                if is_valid_origin(origin) {
                    Ok(origin.to_string())
                } else {
                    Err(ConfigError::Invalid {
                        key: "CORS_ORIGINS",
                        value: origin.to_string(),
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::List)
    }
}

fn is_valid_origin(origin: &str) -> bool {
    let Ok(uri) = origin.parse::<Uri>() else {
        return false;
    };
    uri.scheme().is_some() && uri.host().is_some() && HeaderValue::from_str(origin).is_ok()
}

/// Signing key for runs without `SECRET_KEY`. Tokens die with the process.
fn random_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Administrator created on startup when the credentials are configured
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub secret_key: String,
    pub token_ttl_hours: i64,
    pub cors_origins: CorsOrigins,
    pub admin: Option<AdminBootstrap>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url = get("DATABASE_URL").map(|url| normalize_database_url(&url));

        let secret_key = match (get("SECRET_KEY"), &database_url) {
            (Some(secret), _) => secret,
            (None, Some(_)) => return Err(ConfigError::Missing("SECRET_KEY")),
            (None, None) => {
                log::warn!("SECRET_KEY not set, signing tokens with a random per-process key");
                random_secret()
            }
        };

        let port: u16 = match get("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value,
            })?,
            None => 5000,
        };

        let token_ttl_hours = match get("TOKEN_TTL_HOURS") {
            Some(value) => match value.parse::<i64>() {
                Ok(hours) if hours > 0 => hours,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "TOKEN_TTL_HOURS",
                        value,
                    })
                }
            },
            None => 24,
        };

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                email,
                password,
                name: get("ADMIN_NAME").unwrap_or_else(|| "Administrador".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url,
            secret_key,
            token_ttl_hours,
            cors_origins: CorsOrigins::parse(lookup("CORS_ORIGINS").as_deref())?,
            admin,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Hosting providers hand out `postgres://` URLs; use the canonical scheme.
pub fn normalize_database_url(url: &str) -> String {
    match url.strip_prefix("postgres://") {
        Some(rest) => format!("postgresql://{rest}"),
        None => url.to_string(),
    }
}
