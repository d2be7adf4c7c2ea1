//! # Classroom Core
//!
//! Core abstractions for the classroom service: domain types, errors,
//! configuration, persistence and identity traits, the query cache, rate
//! limiting, CSV rendering and role routing.

pub mod adapters;
pub mod cache;
pub mod config;
pub mod csv_export;
pub mod env;
pub mod error;
pub mod grading;
pub mod logger;
pub mod middleware;
pub mod password;
pub mod plugin;
pub mod rate_limit;
pub mod reports;
pub mod robots;
pub mod roles;
pub mod session;
pub mod types;
pub mod upload;

pub use adapters::{
    AssignmentOps, CourseOps, DatabaseAdapter, FileOps, GradeOps, IdentityProvider,
    MembershipOps, MemoryDatabaseAdapter, MemoryIdentityProvider, QuizOps, SubmissionOps,
};
pub use cache::{CacheAdapter, MemoryCacheAdapter, QueryCache};
pub use config::{AppConfig, SameSite, SessionConfig, UploadConfig};
pub use csv_export::{CsvColumn, CsvRecord, csv_filename, to_csv, to_csv_serialized};
pub use env::{ConfigError, EnvConfig};
pub use error::{
    AppError, AppResult, DatabaseError, field_errors, validate_request_body,
    validation_error_response,
};
pub use logger::{LogLevel, Logger, MemoryLogger, TracingLogger};
pub use middleware::{BodyLimitConfig, BodyLimitMiddleware, Middleware};
pub use plugin::{AppContext, AppPlugin, AppRoute};
pub use rate_limit::{
    ActionRateLimit, GovernorRateLimiter, RateLimitConfig, RateLimitDecision, RateLimiter,
    SlidingWindowRateLimiter,
};
pub use roles::{Role, resolve_dashboard_route, resolve_role};
pub use types::{
    AppRequest, AppResponse, Assignment, Course, CourseStatus, CreateAssignment, CreateCourse,
    CreateFile, CreateMembership, CreateQuiz, CreateQuizAttempt, CreateSubmission, CreateUser,
    Grade, HealthCheckResponse, HttpMethod, MembershipStatus, ProgressReportRow, Quiz,
    QuizAttempt, QuizQuestion, SchoolReportRow, Session, Submission, SuccessResponse,
    TenantMembership, UpdateAssignment, UploadedFile, UpsertGrade, User,
};
