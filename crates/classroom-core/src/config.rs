use crate::error::AppError;
use crate::logger::{Logger, TracingLogger};
use chrono::Duration;
use std::sync::Arc;

/// Decoded upload size limit: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Main configuration for the classroom service.
#[derive(Clone)]
pub struct AppConfig {
    /// Application name, used in the health check and logs.
    ///
    /// Defaults to `"Classroom"`.
    pub app_name: String,

    /// Base URL the service is reachable at (e.g. `"http://localhost:3000"`).
    pub base_url: String,

    /// Public site URL advertised to crawlers. When set, `robots.txt`
    /// carries a `Sitemap:` line.
    pub site_url: Option<String>,

    /// Logger implementation.
    ///
    /// Defaults to a [`TracingLogger`](crate::logger::TracingLogger) that
    /// delegates to the `tracing` crate.
    pub logger: Arc<dyn Logger>,

    /// Session cookie configuration
    pub session: SessionConfig,

    /// Upload validation configuration
    pub upload: UploadConfig,

    /// Lifetime of memoized read queries.
    pub cache_ttl: Duration,

    /// Reverse proxies in front of the service that append to
    /// `x-forwarded-for`. Zero means forwarding headers are not trusted and
    /// anonymous callers are keyed by their peer address.
    pub trusted_proxy_hops: usize,
}

/// Session cookie configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session expiration duration
    pub expires_in: Duration,

    /// Cookie name for session token
    pub cookie_name: String,

    pub cookie_secure: bool,
    pub cookie_http_only: bool,
    pub cookie_same_site: SameSite,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Largest accepted decoded file, in bytes.
    pub max_file_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl std::fmt::Display for SameSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "Classroom".to_string(),
            base_url: "http://localhost:3000".to_string(),
            site_url: None,
            logger: Arc::new(TracingLogger),
            session: SessionConfig::default(),
            upload: UploadConfig::default(),
            cache_ttl: Duration::seconds(crate::cache::DEFAULT_QUERY_TTL_SECS),
            trusted_proxy_hops: 0,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expires_in: Duration::hours(24 * 7),
            cookie_name: "classroom.session-token".to_string(),
            cookie_secure: true,
            cookie_http_only: true,
            cookie_same_site: SameSite::Lax,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Set the base URL (e.g. `"https://school.example.com"`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the public site URL used for the crawler sitemap.
    pub fn site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = Some(url.into());
        self
    }

    /// Set a custom logger implementation.
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Set the session expiration duration.
    pub fn session_expires_in(mut self, duration: Duration) -> Self {
        self.session.expires_in = duration;
        self
    }

    pub fn session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.session.cookie_name = name.into();
        self
    }

    /// Whether the session cookie carries the `Secure` attribute. Turn off
    /// for plain-HTTP local development.
    pub fn session_cookie_secure(mut self, secure: bool) -> Self {
        self.session.cookie_secure = secure;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.upload.max_file_bytes = bytes;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn trusted_proxy_hops(mut self, hops: usize) -> Self {
        self.trusted_proxy_hops = hops;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        url::Url::parse(&self.base_url)
            .map_err(|e| AppError::config(format!("Invalid base URL {}: {}", self.base_url, e)))?;

        if let Some(site_url) = &self.site_url {
            url::Url::parse(site_url)
                .map_err(|e| AppError::config(format!("Invalid site URL {}: {}", site_url, e)))?;
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(AppError::config("Session cookie name cannot be empty"));
        }

        if self.upload.max_file_bytes == 0 {
            return Err(AppError::config("Upload limit must be greater than zero"));
        }

        if self.cache_ttl <= Duration::zero() {
            return Err(AppError::config("Cache TTL must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.upload.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(config.cache_ttl, Duration::seconds(60));
        assert_eq!(config.trusted_proxy_hops, 0);
    }

    #[test]
    fn test_rejects_malformed_urls() {
        assert!(AppConfig::new().base_url("not a url").validate().is_err());
        assert!(AppConfig::new().site_url("::").validate().is_err());
        assert!(
            AppConfig::new()
                .site_url("https://school.example.com")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_rejects_empty_cookie_name_and_zero_upload() {
        assert!(AppConfig::new().session_cookie_name(" ").validate().is_err());
        assert!(AppConfig::new().max_upload_bytes(0).validate().is_err());
    }
}
