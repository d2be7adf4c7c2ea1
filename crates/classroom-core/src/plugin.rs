use async_trait::async_trait;
use std::sync::Arc;

use crate::adapters::{DatabaseAdapter, IdentityProvider};
use crate::cache::QueryCache;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::rate_limit::RateLimiter;
use crate::session::extract_session_token;
use crate::types::{AppRequest, AppResponse, HttpMethod, Session, User};

/// Feature plugin. Each plugin owns a group of routes.
#[async_trait]
pub trait AppPlugin<DB: DatabaseAdapter>: Send + Sync {
    /// Plugin name - should be unique
    fn name(&self) -> &'static str;

    /// Routes that this plugin handles
    fn routes(&self) -> Vec<AppRoute>;

    /// Called once when the application is built.
    async fn on_init(&self, ctx: &mut AppContext<DB>) -> AppResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Called for each request - return Some(response) to handle, None to pass through
    async fn on_request(
        &self,
        req: &AppRequest,
        ctx: &AppContext<DB>,
    ) -> AppResult<Option<AppResponse>>;
}

/// Route definition for plugins
#[derive(Debug, Clone)]
pub struct AppRoute {
    pub path: String,
    pub method: HttpMethod,
    pub operation_id: String,
}

impl AppRoute {
    pub fn new(
        method: HttpMethod,
        path: impl Into<String>,
        operation_id: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            method,
            operation_id: operation_id.into(),
        }
    }

    pub fn get(path: impl Into<String>, operation_id: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path, operation_id)
    }

    pub fn post(path: impl Into<String>, operation_id: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path, operation_id)
    }

    pub fn matches(&self, req: &AppRequest) -> bool {
        self.method == req.method && self.path == req.path
    }
}

/// Shared services handed to every plugin.
pub struct AppContext<DB: DatabaseAdapter> {
    pub config: Arc<AppConfig>,
    pub database: Arc<DB>,
    pub identity: Arc<dyn IdentityProvider>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub cache: QueryCache,
}

impl<DB: DatabaseAdapter> AppContext<DB> {
    pub fn new(
        config: Arc<AppConfig>,
        database: Arc<DB>,
        identity: Arc<dyn IdentityProvider>,
        rate_limiter: Arc<dyn RateLimiter>,
        cache: QueryCache,
    ) -> Self {
        Self {
            config,
            database,
            identity,
            rate_limiter,
            cache,
        }
    }

    pub fn session_token(&self, req: &AppRequest) -> Option<String> {
        extract_session_token(req, &self.config.session.cookie_name)
    }

    /// Resolve the caller's session, if any.
    pub async fn current_session(&self, req: &AppRequest) -> AppResult<Option<(User, Session)>> {
        match self.session_token(req) {
            Some(token) => self.identity.get_session(&token).await,
            None => Ok(None),
        }
    }

    /// Like [`AppContext::current_session`] but fails with 401 when absent.
    pub async fn require_session(&self, req: &AppRequest) -> AppResult<(User, Session)> {
        self.current_session(req)
            .await?
            .ok_or(AppError::Unauthenticated)
    }
}
