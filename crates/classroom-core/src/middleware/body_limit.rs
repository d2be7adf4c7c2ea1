use async_trait::async_trait;

use super::Middleware;
use crate::error::{AppError, AppResult};
use crate::types::{AppRequest, AppResponse};

/// Uploads travel base64-encoded inside JSON, so the request ceiling sits
/// above the decoded file limit.
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct BodyLimitConfig {
    pub max_bytes: usize,
    pub enabled: bool,
}

impl Default for BodyLimitConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BODY_BYTES,
            enabled: true,
        }
    }
}

impl BodyLimitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_bytes(mut self, max: usize) -> Self {
        self.max_bytes = max;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Answers 413 before dispatch when a request body, or its declared
/// `content-length`, is over the limit.
pub struct BodyLimitMiddleware {
    config: BodyLimitConfig,
}

impl BodyLimitMiddleware {
    pub fn new(config: BodyLimitConfig) -> Self {
        Self { config }
    }

    fn request_size(req: &AppRequest) -> usize {
        let declared = req
            .header("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let actual = req.body.as_ref().map_or(0, Vec::len);
        declared.max(actual)
    }
}

#[async_trait]
impl Middleware for BodyLimitMiddleware {
    fn name(&self) -> &'static str {
        "body-limit"
    }

    async fn before_request(&self, req: &AppRequest) -> AppResult<Option<AppResponse>> {
        if !self.config.enabled {
            return Ok(None);
        }

        let size = Self::request_size(req);
        if size <= self.config.max_bytes {
            return Ok(None);
        }

        tracing::info!(
            path = %req.path,
            size,
            limit = self.config.max_bytes,
            "request body over limit"
        );
        let err = AppError::PayloadTooLarge(format!(
            "Request body exceeds maximum size of {} bytes",
            self.config.max_bytes
        ));
        Ok(Some(err.into_response()))
    }
}
