//! Server action pipeline.
//!
//! Every mutating endpoint runs through [`run_action`], which applies, in
//! order: caller identification, the rate limit, the session and role gate,
//! body validation, and finally the action's single write.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use classroom_core::roles::{Role, resolve_role};
use classroom_core::{
    AppContext, AppError, AppRequest, AppResponse, AppResult, DatabaseAdapter, Session,
    SuccessResponse, User, validate_request_body,
};

/// Rate limit key used when neither a user nor a client address is known.
pub const ANONYMOUS_CALLER: &str = "anonymous";

/// Who is calling an action.
#[derive(Debug, Clone)]
pub struct ActionCaller {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub role: Option<Role>,
    /// Rate limit identity: user id, else client IP, else `anonymous`.
    pub key: String,
}

impl ActionCaller {
    /// The signed-in user. Only fails for actions that skip the session gate.
    pub fn user(&self) -> AppResult<&User> {
        self.user.as_ref().ok_or(AppError::Unauthenticated)
    }
}

/// A named, rate-limited, validated operation with one write.
#[async_trait]
pub trait ServerAction<DB: DatabaseAdapter>: Send + Sync {
    /// Request body schema.
    type Input: DeserializeOwned + Validate + Send;
    type Output: Serialize + Send;

    /// Action name; also the rate limit bucket prefix.
    fn name(&self) -> &'static str;

    fn requires_session(&self) -> bool {
        true
    }

    /// Roles allowed to call the action at all. `None` admits any caller
    /// that passed the session gate.
    fn allowed_roles(&self) -> Option<&'static [Role]> {
        None
    }

    async fn perform(
        &self,
        input: Self::Input,
        caller: &ActionCaller,
        ctx: &AppContext<DB>,
    ) -> AppResult<Self::Output>;

    /// Turn the output into the HTTP response.
    fn respond(&self, output: Self::Output, ctx: &AppContext<DB>) -> AppResult<AppResponse> {
        let _ = ctx;
        Ok(AppResponse::json(200, &SuccessResponse::new(output))?)
    }
}

/// Identify the caller of `req`.
///
/// A failing session lookup degrades to an anonymous caller so that the
/// rate limit still applies before anything else.
pub async fn identify_caller<DB: DatabaseAdapter>(
    req: &AppRequest,
    ctx: &AppContext<DB>,
) -> ActionCaller {
    let session = match ctx.current_session(req).await {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!(error = %err, "session lookup failed");
            None
        }
    };

    match session {
        Some((user, session)) => {
            let role = resolve_role(ctx.database.as_ref(), &user.id, user.role.as_deref()).await;
            ActionCaller {
                key: user.id.clone(),
                user: Some(user),
                session: Some(session),
                role,
            }
        }
        None => ActionCaller {
            user: None,
            session: None,
            role: None,
            key: req
                .client_ip(ctx.config.trusted_proxy_hops)
                .unwrap_or_else(|| ANONYMOUS_CALLER.to_string()),
        },
    }
}

/// Run `action` against `req`.
///
/// A validation failure is returned as a ready 422 response; every other
/// failure is an [`AppError`] for the caller to render.
pub async fn run_action<DB, A>(
    action: &A,
    req: &AppRequest,
    ctx: &AppContext<DB>,
) -> AppResult<AppResponse>
where
    DB: DatabaseAdapter,
    A: ServerAction<DB>,
{
    let caller = identify_caller(req, ctx).await;

    ctx.rate_limiter
        .check(action.name(), &caller.key)
        .await?
        .into_result()?;

    if action.requires_session() && caller.user.is_none() {
        return Err(AppError::Unauthenticated);
    }

    if let Some(allowed) = action.allowed_roles()
        && !caller.role.is_some_and(|role| allowed.contains(&role))
    {
        tracing::debug!(
            action = action.name(),
            caller = %caller.key,
            role = ?caller.role,
            "role gate rejected caller"
        );
        return Err(AppError::Unauthorized);
    }

    let input: A::Input = match validate_request_body(req) {
        Ok(input) => input,
        Err(response) => return Ok(response),
    };

    let output = action.perform(input, &caller, ctx).await?;
    tracing::info!(action = action.name(), caller = %caller.key, "action completed");

    action.respond(output, ctx)
}

/// Roles that manage coursework.
pub const STAFF_ROLES: &[Role] = &[Role::Teacher, Role::Admin, Role::SuperAdmin];

/// Roles that hand in coursework.
pub const STUDENT_ROLES: &[Role] = &[Role::Student];

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde::Deserialize;

    use super::*;
    use classroom_core::{
        AppConfig, CreateUser, HttpMethod, IdentityProvider, MemoryDatabaseAdapter,
        MemoryIdentityProvider, QueryCache, RateLimitConfig, SlidingWindowRateLimiter,
    };

    #[derive(Debug, Default, Deserialize, Validate)]
    #[serde(default)]
    struct NoteInput {
        #[validate(length(min = 1, message = "Text is required"))]
        text: String,
    }

    struct NoteAction {
        performed: AtomicUsize,
    }

    #[async_trait]
    impl ServerAction<MemoryDatabaseAdapter> for NoteAction {
        type Input = NoteInput;
        type Output = String;

        fn name(&self) -> &'static str {
            "note"
        }

        fn allowed_roles(&self) -> Option<&'static [Role]> {
            Some(STAFF_ROLES)
        }

        async fn perform(
            &self,
            input: NoteInput,
            _caller: &ActionCaller,
            _ctx: &AppContext<MemoryDatabaseAdapter>,
        ) -> AppResult<String> {
            self.performed.fetch_add(1, Ordering::SeqCst);
            Ok(input.text)
        }
    }

    fn note_action() -> NoteAction {
        NoteAction {
            performed: AtomicUsize::new(0),
        }
    }

    fn context(
        rate_limit: RateLimitConfig,
    ) -> (AppContext<MemoryDatabaseAdapter>, Arc<MemoryIdentityProvider>) {
        context_with(AppConfig::new(), rate_limit)
    }

    fn context_with(
        config: AppConfig,
        rate_limit: RateLimitConfig,
    ) -> (AppContext<MemoryDatabaseAdapter>, Arc<MemoryIdentityProvider>) {
        let identity = Arc::new(MemoryIdentityProvider::new());
        let ctx = AppContext::new(
            Arc::new(config),
            Arc::new(MemoryDatabaseAdapter::new()),
            identity.clone(),
            Arc::new(SlidingWindowRateLimiter::new(rate_limit)),
            QueryCache::in_memory(),
        );
        (ctx, identity)
    }

    async fn signed_in(identity: &MemoryIdentityProvider, role: &str) -> (User, String) {
        let user = identity
            .sign_up(CreateUser::new(format!("{}@school.test", role), "password123").with_role(role))
            .await
            .unwrap();
        let (_, session) = identity
            .sign_in_with_password(&user.email, "password123")
            .await
            .unwrap();
        (user, session.token)
    }

    fn note_request(text: &str, token: Option<&str>) -> AppRequest {
        let mut req = AppRequest::new(HttpMethod::Post, "/actions/note");
        req.body = Some(serde_json::json!({ "text": text }).to_string().into_bytes());
        if let Some(token) = token {
            req.headers
                .insert("authorization".to_string(), format!("Bearer {}", token));
        }
        req
    }

    #[tokio::test]
    async fn test_anonymous_caller_keys() {
        let (direct, _) = context(RateLimitConfig::default());
        let (proxied, _) =
            context_with(AppConfig::new().trusted_proxy_hops(1), RateLimitConfig::default());

        let mut req = AppRequest::new(HttpMethod::Post, "/login");
        req.remote_addr = Some("192.0.2.40".parse().unwrap());
        req.headers.insert(
            "x-forwarded-for".to_string(),
            "203.0.113.5, 10.0.0.1".to_string(),
        );
        assert_eq!(identify_caller(&req, &direct).await.key, "192.0.2.40");
        assert_eq!(identify_caller(&req, &proxied).await.key, "10.0.0.1");

        let mut req = AppRequest::new(HttpMethod::Post, "/login");
        req.headers
            .insert("x-real-ip".to_string(), "198.51.100.2".to_string());
        assert_eq!(identify_caller(&req, &proxied).await.key, "198.51.100.2");
        assert_eq!(identify_caller(&req, &direct).await.key, ANONYMOUS_CALLER);

        let (ctx, _) = context(RateLimitConfig::default());
        let req = AppRequest::new(HttpMethod::Post, "/login");
        let caller = identify_caller(&req, &ctx).await;
        assert_eq!(caller.key, ANONYMOUS_CALLER);
        assert!(caller.user().is_err());
    }

    #[tokio::test]
    async fn test_unknown_token_degrades_to_anonymous() {
        let (ctx, _) = context(RateLimitConfig::default());
        let caller = identify_caller(&note_request("hi", Some("session_nope")), &ctx).await;
        assert!(caller.user.is_none());
        assert_eq!(caller.key, ANONYMOUS_CALLER);
    }

    #[tokio::test]
    async fn test_signed_in_caller_is_keyed_by_user() {
        let (ctx, identity) = context(RateLimitConfig::default());
        let (user, token) = signed_in(&identity, "teacher").await;

        let caller = identify_caller(&note_request("hi", Some(&token)), &ctx).await;
        assert_eq!(caller.key, user.id);
        assert_eq!(caller.role, Some(Role::Teacher));
    }

    #[tokio::test]
    async fn test_rate_limit_runs_before_perform() {
        let (ctx, identity) = context(
            RateLimitConfig::new().action("note", Duration::from_secs(60), 1),
        );
        let (_, token) = signed_in(&identity, "teacher").await;
        let action = note_action();

        let response = run_action(&action, &note_request("first", Some(&token)), &ctx)
            .await
            .unwrap();
        assert_eq!(response.status, 200);

        for _ in 0..3 {
            let err = run_action(&action, &note_request("again", Some(&token)), &ctx)
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), 429);
        }
        assert_eq!(action.performed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gates_and_validation() {
        let (ctx, identity) = context(RateLimitConfig::default());
        let action = note_action();

        let err = run_action(&action, &note_request("hi", None), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);

        let (_, student) = signed_in(&identity, "student").await;
        let err = run_action(&action, &note_request("hi", Some(&student)), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);

        let (_, teacher) = signed_in(&identity, "teacher").await;
        let response = run_action(&action, &note_request("", Some(&teacher)), &ctx)
            .await
            .unwrap();
        assert_eq!(response.status, 422);

        assert_eq!(action.performed.load(Ordering::SeqCst), 0);
    }
}
