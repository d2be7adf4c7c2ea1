use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

// ============================================================================
// Identity types
// ============================================================================

/// Identity-provider user record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    /// Role claim attached by the identity provider. Used as the
    /// request-scoped hint when resolving the landing route.
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Identity-provider session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Data needed to register a user with the identity provider.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub role: Option<String>,
}

impl CreateUser {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            name: None,
            role: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

// ============================================================================
// Tenancy
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Inactive,
}

/// Links a user to a role inside a tenant (school).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantMembership {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    /// Raw role name as stored. Parse with [`crate::roles::Role::parse`].
    pub role: String,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
}

impl TenantMembership {
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }
}

#[derive(Debug, Clone)]
pub struct CreateMembership {
    pub tenant_id: String,
    pub user_id: String,
    pub role: String,
    pub status: MembershipStatus,
}

impl CreateMembership {
    pub fn new(
        tenant_id: impl Into<String>,
        user_id: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            role: role.into(),
            status: MembershipStatus::Active,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.status = MembershipStatus::Inactive;
        self
    }
}

// ============================================================================
// Courses
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Active,
    Archived,
    Draft,
}

impl std::fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Archived => write!(f, "archived"),
            Self::Draft => write!(f, "draft"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub teacher_id: String,
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateCourse {
    pub tenant_id: String,
    pub name: String,
    pub teacher_id: String,
    pub status: CourseStatus,
}

impl CreateCourse {
    pub fn new(
        tenant_id: impl Into<String>,
        name: impl Into<String>,
        teacher_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            name: name.into(),
            teacher_id: teacher_id.into(),
            status: CourseStatus::Active,
        }
    }

    pub fn with_status(mut self, status: CourseStatus) -> Self {
        self.status = status;
        self
    }
}

// ============================================================================
// Coursework
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub max_score: f64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAssignment {
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub max_score: f64,
    pub created_by: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAssignment {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub max_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    pub score: f64,
    pub feedback: Option<String>,
    pub graded_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Grade write. At most one grade exists per (assignment, student); posting
/// again replaces the score and feedback.
#[derive(Debug, Clone)]
pub struct UpsertGrade {
    pub assignment_id: String,
    pub student_id: String,
    pub score: f64,
    pub feedback: Option<String>,
    pub graded_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: usize,
    pub points: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub questions: Vec<QuizQuestion>,
    pub time_limit_minutes: Option<u32>,
    pub published: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateQuiz {
    pub course_id: String,
    pub title: String,
    pub questions: Vec<QuizQuestion>,
    pub time_limit_minutes: Option<u32>,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: String,
    pub quiz_id: String,
    pub student_id: String,
    pub answers: Vec<Option<usize>>,
    pub score: f64,
    pub max_score: f64,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateQuizAttempt {
    pub quiz_id: String,
    pub student_id: String,
    pub answers: Vec<Option<usize>>,
    pub score: f64,
    pub max_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    pub content: Option<String>,
    pub file_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateSubmission {
    pub assignment_id: String,
    pub student_id: String,
    pub content: Option<String>,
    pub file_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: String,
    pub owner_id: String,
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateFile {
    pub owner_id: String,
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
}

// ============================================================================
// Report rows
// ============================================================================

/// One line of the school (tenant) course report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchoolReportRow {
    pub course_name: String,
    pub teacher: String,
    pub student_count: usize,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// One line of a parent-facing progress report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressReportRow {
    pub assignment: String,
    pub course: String,
    pub score: Option<f64>,
    pub percentage: Option<f64>,
    pub letter_grade: Option<String>,
    pub date: Option<String>,
}

// ============================================================================
// Request / response wrappers
// ============================================================================

/// HTTP method enumeration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

/// Framework-independent request.
#[derive(Debug, Clone)]
pub struct AppRequest {
    pub method: HttpMethod,
    pub path: String,
    /// Header names are stored lower-case.
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub query: HashMap<String, String>,
    /// Peer address of the connection, when the transport knows it.
    pub remote_addr: Option<IpAddr>,
}

/// Framework-independent response.
#[derive(Debug, Clone)]
pub struct AppResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl AppRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            body: None,
            query: HashMap::new(),
            remote_addr: None,
        }
    }

    pub fn method(&self) -> &HttpMethod {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn body_as_json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        match &self.body {
            Some(body) => serde_json::from_slice(body),
            None => serde_json::from_slice(b"{}"),
        }
    }

    /// Client address behind `trusted_proxy_hops` reverse proxies.
    ///
    /// With no trusted proxies, forwarding headers are client-controlled and
    /// ignored; the peer address is used. Otherwise each trusted proxy has
    /// appended one `x-forwarded-for` entry, so the client is the
    /// `trusted_proxy_hops`-th entry from the right. `x-real-ip` and then the
    /// peer address are the fallbacks.
    pub fn client_ip(&self, trusted_proxy_hops: usize) -> Option<String> {
        let peer = self.remote_addr.map(|addr| addr.to_string());
        if trusted_proxy_hops == 0 {
            return peer;
        }

        let forwarded: Vec<&str> = self
            .header("x-forwarded-for")
            .map(|v| v.split(',').map(str::trim).filter(|e| !e.is_empty()).collect())
            .unwrap_or_default();
        let index = forwarded.len().saturating_sub(trusted_proxy_hops);

        forwarded
            .get(index)
            .map(|entry| entry.to_string())
            .or_else(|| self.header("x-real-ip").cloned())
            .or(peer)
    }
}

impl AppResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn json<T: Serialize>(status: u16, data: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(data)?;
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());

        Ok(Self {
            status,
            headers,
            body,
        })
    }

    pub fn text(status: u16, text: impl Into<String>) -> Self {
        let body = text.into().into_bytes();
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "text/plain; charset=utf-8".to_string(),
        );

        Self {
            status,
            headers,
            body,
        }
    }

    /// CSV download with an attachment disposition.
    pub fn csv(body: String, file_name: &str) -> Self {
        Self::new(200)
            .with_header("content-type", "text/csv; charset=utf-8")
            .with_header(
                "content-disposition",
                format!("attachment; filename=\"{}\"", file_name),
            )
            .with_body(body.into_bytes())
    }

    /// 302 redirect.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new(302).with_header("location", location)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

/// `{ "success": true, "data": ... }`
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: &'static str,
    pub service: &'static str,
}
