use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use classroom_core::roles::{LOGIN_ROUTE, Role, resolve_dashboard_route};
use classroom_core::session::{clear_session_cookie, session_cookie};
use classroom_core::{
    AppContext, AppError, AppPlugin, AppRequest, AppResponse, AppResult, AppRoute,
    CreateUser, DatabaseAdapter, HttpMethod, SuccessResponse, User,
};

use crate::action::{ActionCaller, ServerAction, run_action};

/// Sign-in, sign-up, sign-out and the role-based dashboard redirect.
pub struct SessionPlugin {
    config: SessionPluginConfig,
}

#[derive(Debug, Clone)]
pub struct SessionPluginConfig {
    pub enable_signup: bool,
}

impl Default for SessionPluginConfig {
    fn default() -> Self {
        Self {
            enable_signup: true,
        }
    }
}

impl SessionPlugin {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            config: SessionPluginConfig::default(),
        }
    }

    pub fn enable_signup(mut self, enable: bool) -> Self {
        self.config.enable_signup = enable;
        self
    }

    async fn handle_logout<DB: DatabaseAdapter>(
        &self,
        req: &AppRequest,
        ctx: &AppContext<DB>,
    ) -> AppResponse {
        let result = match ctx.session_token(req) {
            Some(token) => ctx.identity.sign_out(&token).await,
            None => Err(AppError::bad_request("No active session")),
        };

        match result {
            Ok(()) => AppResponse::redirect(LOGIN_ROUTE)
                .with_header("Set-Cookie", clear_session_cookie(&ctx.config.session)),
            Err(err) => {
                tracing::info!(error = %err, "sign out failed");
                err.into_response_with_status(400)
            }
        }
    }

    async fn handle_dashboard<DB: DatabaseAdapter>(
        &self,
        req: &AppRequest,
        ctx: &AppContext<DB>,
    ) -> AppResult<AppResponse> {
        let Some((user, _session)) = ctx.current_session(req).await? else {
            return Ok(AppResponse::redirect(LOGIN_ROUTE));
        };

        let route =
            resolve_dashboard_route(ctx.database.as_ref(), &user.id, user.role.as_deref()).await;
        Ok(AppResponse::redirect(route))
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutput {
    pub user: User,
    pub token: String,
    pub redirect_to: &'static str,
}

pub struct LoginAction;

#[async_trait]
impl<DB: DatabaseAdapter> ServerAction<DB> for LoginAction {
    type Input = LoginInput;
    type Output = LoginOutput;

    fn name(&self) -> &'static str {
        "login"
    }

    fn requires_session(&self) -> bool {
        false
    }

    async fn perform(
        &self,
        input: LoginInput,
        _caller: &ActionCaller,
        ctx: &AppContext<DB>,
    ) -> AppResult<LoginOutput> {
        let (user, session) = ctx
            .identity
            .sign_in_with_password(&input.email, &input.password)
            .await?;

        let redirect_to =
            resolve_dashboard_route(ctx.database.as_ref(), &user.id, user.role.as_deref()).await;

        Ok(LoginOutput {
            user,
            token: session.token,
            redirect_to,
        })
    }

    fn respond(&self, output: LoginOutput, ctx: &AppContext<DB>) -> AppResult<AppResponse> {
        let cookie = session_cookie(&output.token, &ctx.config.session);
        Ok(AppResponse::json(200, &SuccessResponse::new(output))?
            .with_header("Set-Cookie", cookie))
    }
}

/// Roles a visitor may pick for themselves.
fn self_service_role(role: &str) -> Option<Role> {
    Role::parse(role).filter(|r| matches!(r, Role::Student | Role::Teacher | Role::Parent))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct SignUpInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password must be between 8 and 128 characters"
    ))]
    pub password: String,
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,
    pub role: Option<String>,
}

pub struct SignUpAction;

#[async_trait]
impl<DB: DatabaseAdapter> ServerAction<DB> for SignUpAction {
    type Input = SignUpInput;
    type Output = User;

    fn name(&self) -> &'static str {
        "sign-up"
    }

    fn requires_session(&self) -> bool {
        false
    }

    async fn perform(
        &self,
        input: SignUpInput,
        _caller: &ActionCaller,
        ctx: &AppContext<DB>,
    ) -> AppResult<User> {
        let role = match input.role.as_deref() {
            Some(raw) => Some(self_service_role(raw).ok_or_else(|| {
                AppError::invalid_field("role", "Role must be student, teacher or parent")
            })?),
            None => None,
        };

        let mut create = CreateUser::new(input.email, input.password);
        if let Some(name) = input.name {
            create = create.with_name(name);
        }
        if let Some(role) = role {
            create = create.with_role(role.as_str());
        }

        // Tenant memberships are provisioned by administrators, never here.
        ctx.identity.sign_up(create).await
    }
}

#[async_trait]
impl<DB: DatabaseAdapter> AppPlugin<DB> for SessionPlugin {
    fn name(&self) -> &'static str {
        "session"
    }

    fn routes(&self) -> Vec<AppRoute> {
        let mut routes = vec![
            AppRoute::post("/login", "login"),
            AppRoute::post("/logout", "logout"),
            AppRoute::get("/dashboard", "dashboard"),
        ];

        if self.config.enable_signup {
            routes.push(AppRoute::post("/sign-up", "sign_up"));
        }

        routes
    }

    async fn on_request(
        &self,
        req: &AppRequest,
        ctx: &AppContext<DB>,
    ) -> AppResult<Option<AppResponse>> {
        match (req.method(), req.path()) {
            (HttpMethod::Post, "/login") => Ok(Some(run_action(&LoginAction, req, ctx).await?)),
            (HttpMethod::Post, "/sign-up") if self.config.enable_signup => {
                Ok(Some(run_action(&SignUpAction, req, ctx).await?))
            }
            (HttpMethod::Post, "/logout") => Ok(Some(self.handle_logout(req, ctx).await)),
            (HttpMethod::Get, "/dashboard") => Ok(Some(self.handle_dashboard(req, ctx).await?)),
            _ => Ok(None),
        }
    }
}
