use std::collections::HashMap;
use std::sync::Arc;

use std::net::SocketAddr;

use axum::{
    Router,
    body::Bytes,
    extract::{ConnectInfo, DefaultBodyLimit, FromRequest, FromRequestParts, Request, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get, patch, post, put},
};

use classroom_core::{AppError, AppRequest, AppResponse, DatabaseAdapter, HttpMethod};

use crate::Classroom;

/// Integration trait for the Axum web framework.
pub trait AxumIntegration<DB: DatabaseAdapter> {
    /// Create an Axum router serving the core endpoints and every plugin
    /// route.
    fn axum_router(self) -> Router;
}

impl<DB: DatabaseAdapter> AxumIntegration<DB> for Arc<Classroom<DB>> {
    fn axum_router(self) -> Router {
        let mut router = Router::new()
            .route("/health", get(create_handler::<DB>()))
            .route("/robots.txt", get(create_handler::<DB>()));

        for plugin in self.plugins() {
            for route in plugin.routes() {
                let handler = create_handler::<DB>();
                router = match route.method {
                    HttpMethod::Get => router.route(&route.path, get(handler)),
                    HttpMethod::Post => router.route(&route.path, post(handler)),
                    HttpMethod::Put => router.route(&route.path, put(handler)),
                    HttpMethod::Delete => router.route(&route.path, delete(handler)),
                    HttpMethod::Patch => router.route(&route.path, patch(handler)),
                    HttpMethod::Options | HttpMethod::Head => {
                        tracing::warn!(path = %route.path, "skipping route with unsupported method");
                        router
                    }
                };
            }
        }

        let body_limit = match self.max_body_bytes() {
            Some(max) => DefaultBodyLimit::max(max),
            None => DefaultBodyLimit::disable(),
        };
        router.layer(body_limit).with_state(self)
    }
}

fn create_handler<DB: DatabaseAdapter>() -> impl Fn(
    State<Arc<Classroom<DB>>>,
    Request,
) -> std::pin::Pin<
    Box<dyn std::future::Future<Output = Response> + Send>,
> + Clone {
    |State(app): State<Arc<Classroom<DB>>>, req: Request| {
        Box::pin(async move {
            let result = match convert_axum_request(req, app.max_body_bytes()).await {
                Ok(app_req) => app.handle_request(app_req).await,
                Err(err) => Err(err),
            };
            match result {
                Ok(response) => convert_app_response(response),
                Err(err) => axum::response::IntoResponse::into_response(err),
            }
        })
    }
}

async fn convert_axum_request(
    req: Request,
    max_body_bytes: Option<usize>,
) -> Result<AppRequest, AppError> {
    let (mut parts, body) = req.into_parts();

    let method = match parts.method {
        axum::http::Method::GET => HttpMethod::Get,
        axum::http::Method::POST => HttpMethod::Post,
        axum::http::Method::PUT => HttpMethod::Put,
        axum::http::Method::DELETE => HttpMethod::Delete,
        axum::http::Method::PATCH => HttpMethod::Patch,
        axum::http::Method::OPTIONS => HttpMethod::Options,
        axum::http::Method::HEAD => HttpMethod::Head,
        _ => {
            return Err(AppError::InvalidRequest(
                "Unsupported HTTP method".to_string(),
            ));
        }
    };

    let mut headers = HashMap::new();
    for (name, value) in parts.headers.iter() {
        if let Ok(value_str) = value.to_str() {
            headers.insert(name.as_str().to_ascii_lowercase(), value_str.to_string());
        }
    }

    let mut query = HashMap::new();
    if let Some(query_str) = parts.uri.query() {
        for (key, value) in url::form_urlencoded::parse(query_str.as_bytes()) {
            query.insert(key.to_string(), value.to_string());
        }
    }

    let path = parts.uri.path().to_string();
    let remote_addr = ConnectInfo::<SocketAddr>::from_request_parts(&mut parts, &())
        .await
        .ok()
        .map(|ConnectInfo(addr)| addr.ip());

    // Buffering stops at the router's `DefaultBodyLimit`.
    let body = match Bytes::from_request(Request::from_parts(parts, body), &()).await {
        Ok(bytes) if !bytes.is_empty() => Some(bytes.to_vec()),
        Ok(_) => None,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            tracing::info!(path = %path, limit = ?max_body_bytes, "request body over limit");
            return Err(AppError::PayloadTooLarge(format!(
                "Request body exceeds maximum size of {} bytes",
                max_body_bytes.unwrap_or_default()
            )));
        }
        Err(rejection) => {
            return Err(AppError::bad_request(format!(
                "Failed to read request body: {}",
                rejection.body_text()
            )));
        }
    };

    Ok(AppRequest {
        method,
        path,
        headers,
        body,
        query,
        remote_addr,
    })
}

fn convert_app_response(app_response: AppResponse) -> Response {
    let mut response = Response::builder().status(
        StatusCode::from_u16(app_response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    );

    for (name, value) in app_response.headers {
        if let (Ok(header_name), Ok(header_value)) = (
            axum::http::HeaderName::from_bytes(name.as_bytes()),
            axum::http::HeaderValue::from_str(&value),
        ) {
            response = response.header(header_name, header_value);
        }
    }

    response
        .body(axum::body::Body::from(app_response.body))
        .unwrap_or_else(|_| {
            axum::response::IntoResponse::into_response(StatusCode::INTERNAL_SERVER_ERROR)
        })
}
