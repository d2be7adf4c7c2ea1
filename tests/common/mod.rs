//! Shared test harness for `classroom`.
//!
//! Provides:
//! - [`TestHarness`]: a fully wired `Classroom` over in-memory adapters with
//!   request builders and response parsing.
//! - [`School`]: a seeded tenant with one member per role, a course, an
//!   enrollment and a parent link.
//! - Standalone request builder functions.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use classroom::adapters::{
    CourseOps, IdentityProvider, MembershipOps, MemoryDatabaseAdapter, MemoryIdentityProvider,
};
use classroom::plugins::{
    AssignmentPlugin, ExportPlugin, GradePlugin, QuizPlugin, SessionPlugin, SubmissionPlugin,
    UploadPlugin,
};
use classroom::types::{
    AppRequest, AppResponse, Course, CreateCourse, CreateMembership, CreateUser, HttpMethod,
};
use classroom::{
    AppConfig, BodyLimitConfig, Classroom, ClassroomBuilder, RateLimitConfig,
    SlidingWindowRateLimiter,
};
use serde_json::Value;

pub const PASSWORD: &str = "password123";

// ---------------------------------------------------------------------------
// Unique email generator
// ---------------------------------------------------------------------------

static EMAIL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique email address for testing.
#[allow(dead_code)]
pub fn unique_email(prefix: &str) -> String {
    let n = EMAIL_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{n}@school.test")
}

// ---------------------------------------------------------------------------
// Standalone request builders
// ---------------------------------------------------------------------------

/// Build a POST request with a JSON body and `content-type` header.
#[allow(dead_code)]
pub fn post_json(path: &str, body: Value) -> AppRequest {
    let mut req = AppRequest::new(HttpMethod::Post, path);
    req.body = Some(body.to_string().into_bytes());
    req.headers
        .insert("content-type".to_string(), "application/json".to_string());
    req
}

/// Build a bare GET request with optional query parameters.
#[allow(dead_code)]
pub fn get_request(path: &str, query: &[(&str, &str)]) -> AppRequest {
    let mut req = AppRequest::new(HttpMethod::Get, path);
    for (key, value) in query {
        req.query.insert(key.to_string(), value.to_string());
    }
    req
}

/// Attach a bearer token to a request.
#[allow(dead_code)]
pub fn with_auth(mut req: AppRequest, token: &str) -> AppRequest {
    req.headers
        .insert("authorization".to_string(), format!("Bearer {}", token));
    req
}

/// Parse a response body as JSON, falling back to a JSON string.
#[allow(dead_code)]
pub fn body_json(resp: &AppResponse) -> Value {
    serde_json::from_slice(&resp.body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&resp.body).to_string()))
}

// ---------------------------------------------------------------------------
// Seeded school
// ---------------------------------------------------------------------------

/// A signed-in user.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: String,
    pub token: String,
}

/// One tenant with a member per role.
///
/// `student` is enrolled in `course` and linked to `parent`;
/// `outsider` is a student of the same school without enrollment.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct School {
    pub tenant_id: String,
    pub admin: Member,
    pub teacher: Member,
    pub other_teacher: Member,
    pub student: Member,
    pub outsider: Member,
    pub parent: Member,
    pub course: Course,
}

// ---------------------------------------------------------------------------
// TestHarness
// ---------------------------------------------------------------------------

#[allow(dead_code)]
pub struct TestHarness {
    app: Arc<Classroom<MemoryDatabaseAdapter>>,
    identity: Arc<MemoryIdentityProvider>,
}

#[allow(dead_code)]
impl TestHarness {
    /// Every plugin, default rate limits, no trusted proxy.
    pub async fn new() -> Self {
        Self::build(
            AppConfig::new().site_url("https://school.example"),
            RateLimitConfig::default(),
        )
        .await
    }

    /// Every plugin with the given rate limits, behind one trusted proxy.
    pub async fn with_rate_limit(rate_limit: RateLimitConfig) -> Self {
        Self::build(Self::proxied_config(), rate_limit).await
    }

    /// Every plugin with the given request body limit.
    pub async fn with_body_limit(body_limit: BodyLimitConfig) -> Self {
        Self::build_with(Self::proxied_config(), RateLimitConfig::default(), body_limit).await
    }

    fn proxied_config() -> AppConfig {
        AppConfig::new()
            .site_url("https://school.example")
            .trusted_proxy_hops(1)
    }

    pub async fn build(config: AppConfig, rate_limit: RateLimitConfig) -> Self {
        Self::build_with(config, rate_limit, BodyLimitConfig::default()).await
    }

    pub async fn build_with(
        config: AppConfig,
        rate_limit: RateLimitConfig,
        body_limit: BodyLimitConfig,
    ) -> Self {
        let identity = Arc::new(MemoryIdentityProvider::new());
        let app = ClassroomBuilder::new(config)
            .body_limit(body_limit)
            .database(MemoryDatabaseAdapter::new())
            .shared_identity(identity.clone())
            .rate_limiter(SlidingWindowRateLimiter::new(rate_limit))
            .plugin(SessionPlugin::new())
            .plugin(AssignmentPlugin::new())
            .plugin(GradePlugin::new())
            .plugin(QuizPlugin::new())
            .plugin(SubmissionPlugin::new())
            .plugin(UploadPlugin::new())
            .plugin(ExportPlugin::new())
            .build()
            .await
            .expect("Failed to create test app");
        Self {
            app: Arc::new(app),
            identity,
        }
    }

    pub fn app(&self) -> &Classroom<MemoryDatabaseAdapter> {
        &self.app
    }

    pub fn into_arc(self) -> Arc<Classroom<MemoryDatabaseAdapter>> {
        self.app
    }

    pub fn db(&self) -> &MemoryDatabaseAdapter {
        self.app.database()
    }

    pub async fn send_raw(&self, req: AppRequest) -> AppResponse {
        self.app
            .handle_request(req)
            .await
            .expect("Request should not fail")
    }

    /// Send a request and return `(status_code, parsed_json_body)`.
    pub async fn send(&self, req: AppRequest) -> (u16, Value) {
        let resp = self.send_raw(req).await;
        (resp.status, body_json(&resp))
    }

    pub async fn post(&self, path: &str, body: Value, token: &str) -> (u16, Value) {
        self.send(with_auth(post_json(path, body), token)).await
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)], token: &str) -> (u16, Value) {
        self.send(with_auth(get_request(path, query), token)).await
    }

    // -------------------------------------------------------------------
    // Seeding
    // -------------------------------------------------------------------

    /// Create a user directly at the identity provider and sign them in.
    pub async fn create_user(&self, name: &str, role_claim: Option<&str>) -> Member {
        let mut create = CreateUser::new(unique_email(name), PASSWORD).with_name(name);
        if let Some(role) = role_claim {
            create = create.with_role(role);
        }
        let user = self.identity.sign_up(create).await.expect("sign up");
        let (_, session) = self
            .identity
            .sign_in_with_password(&user.email, PASSWORD)
            .await
            .expect("sign in");
        Member {
            id: user.id,
            token: session.token,
        }
    }

    /// Create a user with an active membership in `tenant_id`.
    pub async fn create_member(&self, tenant_id: &str, name: &str, role: &str) -> Member {
        let member = self.create_user(name, None).await;
        self.db()
            .create_membership(CreateMembership::new(tenant_id, &member.id, role))
            .await
            .expect("membership");
        member
    }

    pub async fn seed_school(&self) -> School {
        let tenant_id = "tenant-1".to_string();
        let admin = self.create_member(&tenant_id, "admin", "admin").await;
        let teacher = self.create_member(&tenant_id, "teacher", "teacher").await;
        let other_teacher = self.create_member(&tenant_id, "other", "teacher").await;
        let student = self.create_member(&tenant_id, "student", "student").await;
        let outsider = self.create_member(&tenant_id, "outsider", "student").await;
        let parent = self.create_member(&tenant_id, "parent", "parent").await;

        let course = self
            .db()
            .create_course(CreateCourse::new(&tenant_id, "Biology", &teacher.id))
            .await
            .expect("course");
        self.db()
            .enroll_student(&course.id, &student.id)
            .await
            .expect("enroll");
        self.db()
            .link_parent(&parent.id, &student.id)
            .await
            .expect("link parent");

        School {
            tenant_id,
            admin,
            teacher,
            other_teacher,
            student,
            outsider,
            parent,
            course,
        }
    }

    /// Create an assignment through the action endpoint and return its id.
    pub async fn create_assignment(&self, school: &School, title: &str, max_score: f64) -> String {
        let (status, body) = self
            .post(
                "/actions/assignments/create",
                serde_json::json!({
                    "courseId": school.course.id,
                    "title": title,
                    "maxScore": max_score,
                }),
                &school.teacher.token,
            )
            .await;
        assert_eq!(status, 200, "create assignment failed: {}", body);
        body["data"]["id"].as_str().expect("assignment id").to_string()
    }
}
