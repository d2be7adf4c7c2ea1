//! Environment-driven deployment settings.
//!
//! Loaded once at startup. Missing required variables fail the whole load
//! with an error that names every one of them.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::AppConfig;

pub const DATABASE_URL: &str = "CLASSROOM_DATABASE_URL";
pub const DATABASE_PUBLIC_KEY: &str = "CLASSROOM_DATABASE_PUBLIC_KEY";
pub const SERVICE_ROLE_KEY: &str = "CLASSROOM_SERVICE_ROLE_KEY";
pub const PAYMENT_SECRET_KEY: &str = "CLASSROOM_PAYMENT_SECRET_KEY";
pub const PAYMENT_PUBLISHABLE_KEY: &str = "CLASSROOM_PAYMENT_PUBLISHABLE_KEY";
pub const PAYMENT_WEBHOOK_SECRET: &str = "CLASSROOM_PAYMENT_WEBHOOK_SECRET";
pub const SITE_URL: &str = "CLASSROOM_SITE_URL";
pub const CAPTCHA_SECRET: &str = "CLASSROOM_CAPTCHA_SECRET";
pub const BIND_ADDR: &str = "CLASSROOM_BIND_ADDR";
pub const TRUSTED_PROXY_HOPS: &str = "CLASSROOM_TRUSTED_PROXY_HOPS";

const REQUIRED: [&str; 2] = [DATABASE_URL, DATABASE_PUBLIC_KEY];

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Payment processor credentials. Only present when fully configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentKeys {
    pub secret_key: String,
    pub publishable_key: String,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub database_url: url::Url,
    pub database_public_key: String,
    pub service_role_key: Option<String>,
    pub payment: Option<PaymentKeys>,
    pub site_url: Option<url::Url>,
    pub captcha_secret: Option<String>,
    pub bind_addr: SocketAddr,
    pub trusted_proxy_hops: usize,
}

impl EnvConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<String> = REQUIRED
            .iter()
            .filter(|name| get(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingVariables(missing));
        }

        let database_url = parse_url(DATABASE_URL, &get(DATABASE_URL).unwrap_or_default())?;
        let site_url = get(SITE_URL)
            .map(|raw| parse_url(SITE_URL, &raw))
            .transpose()?;

        let bind_addr = get(BIND_ADDR)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: BIND_ADDR.to_string(),
                reason: e.to_string(),
            })?;

        let trusted_proxy_hops = get(TRUSTED_PROXY_HOPS)
            .map(|raw| raw.parse::<usize>())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                field: TRUSTED_PROXY_HOPS.to_string(),
                reason: e.to_string(),
            })?
            .unwrap_or(0);

        let payment = match (get(PAYMENT_SECRET_KEY), get(PAYMENT_PUBLISHABLE_KEY)) {
            (Some(secret_key), Some(publishable_key)) => Some(PaymentKeys {
                secret_key,
                publishable_key,
                webhook_secret: get(PAYMENT_WEBHOOK_SECRET),
            }),
            (None, None) => None,
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::InvalidValue {
                    field: PAYMENT_SECRET_KEY.to_string(),
                    reason: format!(
                        "{} and {} must be set together",
                        PAYMENT_SECRET_KEY, PAYMENT_PUBLISHABLE_KEY
                    ),
                });
            }
        };

        Ok(Self {
            database_url,
            database_public_key: get(DATABASE_PUBLIC_KEY).unwrap_or_default(),
            service_role_key: get(SERVICE_ROLE_KEY),
            payment,
            site_url,
            captcha_secret: get(CAPTCHA_SECRET),
            bind_addr,
            trusted_proxy_hops,
        })
    }

    /// Carry deployment settings into the application config.
    pub fn apply(&self, config: AppConfig) -> AppConfig {
        let config = config.trusted_proxy_hops(self.trusted_proxy_hops);
        match &self.site_url {
            Some(site_url) => config
                .base_url(site_url.as_str().trim_end_matches('/'))
                .site_url(site_url.as_str().trim_end_matches('/')),
            None => config.base_url(format!("http://{}", self.bind_addr)),
        }
    }
}

fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https" | "postgres" | "postgresql") {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("unsupported scheme {}", parsed.scheme()),
        });
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<EnvConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_names_every_missing_variable() {
        let err = load(&[]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingVariables(vec![
                DATABASE_URL.to_string(),
                DATABASE_PUBLIC_KEY.to_string(),
            ])
        );
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: CLASSROOM_DATABASE_URL, CLASSROOM_DATABASE_PUBLIC_KEY"
        );
    }

    #[test]
    fn test_blank_counts_as_missing() {
        let err = load(&[(DATABASE_URL, "https://db.example.com"), (DATABASE_PUBLIC_KEY, "  ")])
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingVariables(vec![DATABASE_PUBLIC_KEY.to_string()])
        );
    }

    #[test]
    fn test_rejects_malformed_url() {
        let err = load(&[(DATABASE_URL, "not a url"), (DATABASE_PUBLIC_KEY, "anon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == DATABASE_URL));

        let err = load(&[
            (DATABASE_URL, "https://db.example.com"),
            (DATABASE_PUBLIC_KEY, "anon"),
            (SITE_URL, "ftp://school.example.com"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == SITE_URL));
    }

    #[test]
    fn test_full_config() {
        let config = load(&[
            (DATABASE_URL, "https://db.example.com"),
            (DATABASE_PUBLIC_KEY, "anon"),
            (SERVICE_ROLE_KEY, "service"),
            (PAYMENT_SECRET_KEY, "sk_test"),
            (PAYMENT_PUBLISHABLE_KEY, "pk_test"),
            (SITE_URL, "https://school.example.com"),
            (BIND_ADDR, "0.0.0.0:8080"),
            (TRUSTED_PROXY_HOPS, "1"),
        ])
        .unwrap();

        assert_eq!(config.service_role_key.as_deref(), Some("service"));
        assert_eq!(config.payment.as_ref().unwrap().publishable_key, "pk_test");
        assert!(config.payment.as_ref().unwrap().webhook_secret.is_none());
        assert_eq!(config.bind_addr.port(), 8080);

        let app = config.apply(AppConfig::default());
        assert_eq!(app.site_url.as_deref(), Some("https://school.example.com"));
        assert_eq!(app.trusted_proxy_hops, 1);
    }

    #[test]
    fn test_defaults_for_optional_values() {
        let config = load(&[
            (DATABASE_URL, "postgres://localhost/classroom"),
            (DATABASE_PUBLIC_KEY, "anon"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert!(config.payment.is_none());
        assert!(config.site_url.is_none());
        assert_eq!(config.trusted_proxy_hops, 0);
    }

    #[test]
    fn test_rejects_non_numeric_proxy_hops() {
        let err = load(&[
            (DATABASE_URL, "https://db.example.com"),
            (DATABASE_PUBLIC_KEY, "anon"),
            (TRUSTED_PROXY_HOPS, "two"),
        ])
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref field, .. } if field == TRUSTED_PROXY_HOPS)
        );
    }

    #[test]
    fn test_half_configured_payment_is_rejected() {
        let err = load(&[
            (DATABASE_URL, "https://db.example.com"),
            (DATABASE_PUBLIC_KEY, "anon"),
            (PAYMENT_SECRET_KEY, "sk_test"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
