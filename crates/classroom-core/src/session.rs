//! Session token transport.
//!
//! Tokens are issued by the identity provider. Browsers carry them in the
//! session cookie; API clients send `Authorization: Bearer <token>`.

use chrono::Utc;

use crate::config::SessionConfig;
use crate::types::AppRequest;

/// Extract the session token from a request.
///
/// Tries the Bearer token from the Authorization header first, then the
/// configured cookie.
pub fn extract_session_token(req: &AppRequest, cookie_name: &str) -> Option<String> {
    if let Some(auth_header) = req.header("authorization")
        && let Some(token) = auth_header.strip_prefix("Bearer ")
        && !token.trim().is_empty()
    {
        return Some(token.trim().to_string());
    }

    let cookie_header = req.header("cookie")?;
    let prefix = format!("{}=", cookie_name);
    cookie_header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix(&prefix))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Build a `Set-Cookie` header value for a session token.
pub fn session_cookie(token: &str, config: &SessionConfig) -> String {
    let expires = Utc::now() + config.expires_in;
    let expires_str = expires.format("%a, %d %b %Y %H:%M:%S GMT");

    format!(
        "{}={}; Path=/; Expires={}{}",
        config.cookie_name,
        token,
        expires_str,
        cookie_attributes(config)
    )
}

/// Build a `Set-Cookie` header that expires the session cookie.
pub fn clear_session_cookie(config: &SessionConfig) -> String {
    format!(
        "{}=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0{}",
        config.cookie_name,
        cookie_attributes(config)
    )
}

fn cookie_attributes(config: &SessionConfig) -> String {
    let secure = if config.cookie_secure { "; Secure" } else { "" };
    let http_only = if config.cookie_http_only {
        "; HttpOnly"
    } else {
        ""
    };

    format!("{}{}; SameSite={}", secure, http_only, config.cookie_same_site)
}
