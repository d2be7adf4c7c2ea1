pub mod body_limit;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::types::{AppRequest, AppResponse};

pub use body_limit::{BodyLimitConfig, BodyLimitMiddleware};

/// Hook around plugin dispatch.
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(Some(response))` answers the request without reaching a plugin.
    async fn before_request(&self, req: &AppRequest) -> AppResult<Option<AppResponse>>;

    async fn after_request(
        &self,
        _req: &AppRequest,
        response: AppResponse,
    ) -> AppResult<AppResponse> {
        Ok(response)
    }
}

/// First short-circuit response in registration order, if any.
pub async fn run_before(
    middlewares: &[Box<dyn Middleware>],
    req: &AppRequest,
) -> AppResult<Option<AppResponse>> {
    for middleware in middlewares {
        if let Some(response) = middleware.before_request(req).await? {
            tracing::debug!(
                middleware = middleware.name(),
                path = %req.path,
                status = response.status,
                "request answered by middleware"
            );
            return Ok(Some(response));
        }
    }
    Ok(None)
}

/// Post-processing runs innermost first.
pub async fn run_after(
    middlewares: &[Box<dyn Middleware>],
    req: &AppRequest,
    response: AppResponse,
) -> AppResult<AppResponse> {
    let mut response = response;
    for middleware in middlewares.iter().rev() {
        response = middleware.after_request(req, response).await?;
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HttpMethod;

    struct Stamp(&'static str);

    #[async_trait]
    impl Middleware for Stamp {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn before_request(&self, _req: &AppRequest) -> AppResult<Option<AppResponse>> {
            Ok(None)
        }

        async fn after_request(
            &self,
            _req: &AppRequest,
            response: AppResponse,
        ) -> AppResult<AppResponse> {
            let trail = response
                .header("x-trail")
                .map(|t| format!("{},{}", t, self.0))
                .unwrap_or_else(|| self.0.to_string());
            Ok(response.with_header("x-trail", trail))
        }
    }

    #[tokio::test]
    async fn test_after_hooks_run_in_reverse() {
        let chain: Vec<Box<dyn Middleware>> = vec![Box::new(Stamp("outer")), Box::new(Stamp("inner"))];
        let req = AppRequest::new(HttpMethod::Get, "/health");

        assert!(run_before(&chain, &req).await.unwrap().is_none());
        let response = run_after(&chain, &req, AppResponse::new(200)).await.unwrap();
        assert_eq!(
            response.header("x-trail").map(String::as_str),
            Some("inner,outer")
        );
    }
}
