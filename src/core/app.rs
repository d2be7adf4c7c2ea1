use std::sync::Arc;

use classroom_core::{
    AppConfig, AppContext, AppError, AppPlugin, AppRequest, AppResponse, AppResult,
    BodyLimitConfig, BodyLimitMiddleware, DatabaseAdapter, HealthCheckResponse, HttpMethod,
    IdentityProvider, MemoryIdentityProvider, Middleware, QueryCache, RateLimiter,
    SlidingWindowRateLimiter, middleware, robots::robots_txt,
};

/// The classroom service, generic over the database adapter.
pub struct Classroom<DB: DatabaseAdapter> {
    config: Arc<AppConfig>,
    plugins: Vec<Box<dyn AppPlugin<DB>>>,
    middlewares: Vec<Box<dyn Middleware>>,
    body_limit: BodyLimitConfig,
    context: AppContext<DB>,
}

/// Initial builder for configuring the service.
///
/// Call `.database(adapter)` to obtain a [`TypedClassroomBuilder`] that can
/// accept plugins and collaborators.
pub struct ClassroomBuilder {
    config: AppConfig,
    body_limit_config: Option<BodyLimitConfig>,
}

/// Typed builder returned by [`ClassroomBuilder::database`].
pub struct TypedClassroomBuilder<DB: DatabaseAdapter> {
    config: AppConfig,
    database: Arc<DB>,
    identity: Option<Arc<dyn IdentityProvider>>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    cache: Option<QueryCache>,
    plugins: Vec<Box<dyn AppPlugin<DB>>>,
    body_limit_config: Option<BodyLimitConfig>,
    custom_middlewares: Vec<Box<dyn Middleware>>,
}

impl ClassroomBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            body_limit_config: None,
        }
    }

    /// Set the database adapter, returning a [`TypedClassroomBuilder`].
    pub fn database<DB: DatabaseAdapter>(self, database: DB) -> TypedClassroomBuilder<DB> {
        TypedClassroomBuilder {
            config: self.config,
            database: Arc::new(database),
            identity: None,
            rate_limiter: None,
            cache: None,
            plugins: Vec::new(),
            body_limit_config: self.body_limit_config,
            custom_middlewares: Vec::new(),
        }
    }

    /// Configure body size limit.
    pub fn body_limit(mut self, config: BodyLimitConfig) -> Self {
        self.body_limit_config = Some(config);
        self
    }
}

impl<DB: DatabaseAdapter> TypedClassroomBuilder<DB> {
    pub fn plugin<P: AppPlugin<DB> + 'static>(mut self, plugin: P) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Set the identity provider. Defaults to an in-memory provider whose
    /// sessions live as long as the configured session expiry.
    pub fn identity<I: IdentityProvider + 'static>(mut self, identity: I) -> Self {
        self.identity = Some(Arc::new(identity));
        self
    }

    /// Share an identity provider that is also used elsewhere (e.g. seeding).
    pub fn shared_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Set the rate limiter. Defaults to [`SlidingWindowRateLimiter`] with
    /// the default limits.
    pub fn rate_limiter<R: RateLimiter + 'static>(mut self, limiter: R) -> Self {
        self.rate_limiter = Some(Arc::new(limiter));
        self
    }

    /// Set the query cache. Defaults to an in-memory cache using the
    /// configured TTL.
    pub fn cache(mut self, cache: QueryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Configure body size limit.
    pub fn body_limit(mut self, config: BodyLimitConfig) -> Self {
        self.body_limit_config = Some(config);
        self
    }

    /// Add a custom middleware; it runs after the body limit.
    pub fn middleware<M: Middleware + 'static>(mut self, mw: M) -> Self {
        self.custom_middlewares.push(Box::new(mw));
        self
    }

    pub async fn build(self) -> AppResult<Classroom<DB>> {
        self.config.validate()?;

        let config = Arc::new(self.config);

        let identity = self.identity.unwrap_or_else(|| {
            Arc::new(MemoryIdentityProvider::new().with_session_ttl(config.session.expires_in))
        });
        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| Arc::new(SlidingWindowRateLimiter::default()));
        let cache = self
            .cache
            .unwrap_or_else(|| QueryCache::in_memory().with_default_ttl(config.cache_ttl));

        let mut context =
            AppContext::new(config.clone(), self.database, identity, rate_limiter, cache);

        for plugin in &self.plugins {
            plugin.on_init(&mut context).await?;
        }

        let body_limit = self.body_limit_config.unwrap_or_default();
        let mut middlewares: Vec<Box<dyn Middleware>> =
            vec![Box::new(BodyLimitMiddleware::new(body_limit.clone()))];
        middlewares.extend(self.custom_middlewares);

        config.logger.info(&format!(
            "{} ready with plugins: {}",
            config.app_name,
            self.plugins
                .iter()
                .map(|p| p.name())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        Ok(Classroom {
            config,
            plugins: self.plugins,
            middlewares,
            body_limit,
            context,
        })
    }
}

impl<DB: DatabaseAdapter> Classroom<DB> {
    #[allow(clippy::new_ret_no_self)]
    pub fn new(config: AppConfig) -> ClassroomBuilder {
        ClassroomBuilder::new(config)
    }

    /// Handle a request.
    ///
    /// Errors from plugins and core handlers are rendered through
    /// [`AppError::into_response`] as `{ "error": "..." }` with the error's
    /// status code.
    pub async fn handle_request(&self, req: AppRequest) -> AppResult<AppResponse> {
        let response = match self.handle_request_inner(&req).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        };
        middleware::run_after(&self.middlewares, &req, response).await
    }

    async fn handle_request_inner(&self, req: &AppRequest) -> AppResult<AppResponse> {
        if let Some(response) = middleware::run_before(&self.middlewares, req).await? {
            return Ok(response);
        }

        if let Some(response) = self.handle_core_request(req)? {
            return Ok(response);
        }

        for plugin in &self.plugins {
            if let Some(response) = plugin.on_request(req, &self.context).await? {
                return Ok(response);
            }
        }

        Err(AppError::not_found("No handler found for this request"))
    }

    fn handle_core_request(&self, req: &AppRequest) -> AppResult<Option<AppResponse>> {
        match (req.method(), req.path()) {
            (HttpMethod::Get, "/health") => Ok(Some(AppResponse::json(
                200,
                &HealthCheckResponse {
                    status: "ok",
                    service: "classroom",
                },
            )?)),
            (HttpMethod::Get, "/robots.txt") => Ok(Some(AppResponse::text(
                200,
                robots_txt(self.config.site_url.as_deref()),
            ))),
            _ => Ok(None),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Request body ceiling, or `None` when the body limit is disabled.
    pub fn max_body_bytes(&self) -> Option<usize> {
        self.body_limit.enabled.then_some(self.body_limit.max_bytes)
    }

    pub fn database(&self) -> &Arc<DB> {
        &self.context.database
    }

    pub fn context(&self) -> &AppContext<DB> {
        &self.context
    }

    pub fn plugins(&self) -> &[Box<dyn AppPlugin<DB>>] {
        &self.plugins
    }

    pub fn get_plugin(&self, name: &str) -> Option<&dyn AppPlugin<DB>> {
        self.plugins
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }
}
