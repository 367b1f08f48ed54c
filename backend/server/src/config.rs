use std::{env, fmt, fmt::Display, str::FromStr};

use tracing::{info, warn};

const REQUIRED_KEYS: [&str; 3] = ["DB_HOST", "DB_USER", "DB_NAME"];

pub struct Config {
    pub port: u16,
    pub db_host: Option<String>,
    pub db_port: u16,
    pub db_user: Option<String>,
    pub db_name: Option<String>,
    pub db_ssl_mode: DbSslMode,
    pub cors_origin: CorsOrigin,
}

/// Transport security for database connections, read from `DB_SSLMODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbSslMode {
    Disable,
    Require,
}

impl FromStr for DbSslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disable" => Ok(DbSslMode::Disable),
            "require" => Ok(DbSslMode::Require),
            other => Err(format!("unknown ssl mode {other}, expected disable or require")),
        }
    }
}

impl Display for DbSslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbSslMode::Disable => f.write_str("disable"),
            DbSslMode::Require => f.write_str("require"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigin {
    Any,
    List(Vec<String>),
}

impl Config {
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            port: try_load(&lookup, "PORT", 8080),
            db_host: var(&lookup, "DB_HOST"),
            db_port: try_load(&lookup, "DB_PORT", 5432),
            db_user: var(&lookup, "DB_USER"),
            db_name: var(&lookup, "DB_NAME"),
            db_ssl_mode: try_load(&lookup, "DB_SSLMODE", DbSslMode::Disable),
            cors_origin: CorsOrigin::parse(&var(&lookup, "CORS_ORIGIN").unwrap_or_default()),
        };

        let missing = config.missing_keys();
        if !missing.is_empty() {
            warn!(
                "Missing required env: {}, submissions will fail until set",
                missing.join(", ")
            );
        }

        config
    }

    pub fn missing_keys(&self) -> Vec<&'static str> {
        [&self.db_host, &self.db_user, &self.db_name]
            .into_iter()
            .zip(REQUIRED_KEYS)
            .filter(|(value, _)| value.is_none())
            .map(|(_, key)| key)
            .collect()
    }
}

impl CorsOrigin {
    fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
            CorsOrigin::Any
        } else {
            CorsOrigin::List(origins)
        }
    }
}

fn var<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn try_load<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = var(lookup, key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };

    raw.parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value: {e}, using default: {default}");
        default
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{Config, CorsOrigin, DbSslMode};

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);

        assert_eq!(config.port, 8080);
        assert_eq!(config.db_port, 5432);
        assert_eq!(config.db_ssl_mode, DbSslMode::Disable);
        assert_eq!(config.cors_origin, CorsOrigin::Any);
        assert_eq!(config.missing_keys(), vec!["DB_HOST", "DB_USER", "DB_NAME"]);
    }

    #[test]
    fn test_full_environment() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("DB_HOST", "10.0.0.5"),
            ("DB_PORT", "6543"),
            ("DB_USER", "postgres"),
            ("DB_NAME", "feedback"),
            ("DB_SSLMODE", "Require"),
            ("CORS_ORIGIN", "https://a.example, https://b.example"),
        ]);

        assert_eq!(config.port, 9000);
        assert_eq!(config.db_host.as_deref(), Some("10.0.0.5"));
        assert_eq!(config.db_port, 6543);
        assert_eq!(config.db_ssl_mode, DbSslMode::Require);
        assert!(config.missing_keys().is_empty());
        assert_eq!(
            config.cors_origin,
            CorsOrigin::List(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
    }

    #[test]
    fn test_invalid_port_falls_back() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("DB_USER", "  "),
            ("DB_SSLMODE", "verify-full"),
        ]);

        assert_eq!(config.port, 8080);
        assert_eq!(config.db_ssl_mode, DbSslMode::Disable);
        assert!(config.db_user.is_none());
    }

    #[test]
    fn test_wildcard_wins() {
        let config = config_from(&[("CORS_ORIGIN", "https://a.example,*")]);

        assert_eq!(config.cors_origin, CorsOrigin::Any);
    }
}
