//! # Classroom
//!
//! A role-based learning-management service: role-aware dashboard routing,
//! rate-limited server actions for coursework, CSV exports, a memoized
//! query cache and a crawler policy.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use classroom::{AppConfig, ClassroomBuilder};
//! use classroom::adapters::MemoryDatabaseAdapter;
//! use classroom::plugins::{AssignmentPlugin, SessionPlugin};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = ClassroomBuilder::new(AppConfig::new())
//!         .database(MemoryDatabaseAdapter::new())
//!         .plugin(SessionPlugin::new())
//!         .plugin(AssignmentPlugin::new())
//!         .build()
//!         .await?;
//!
//!     println!("plugins: {:?}", app.plugin_names());
//!     Ok(())
//! }
//! ```

// The orchestrator lives in the root crate because it wires the plugins
// (classroom-api) to the core abstractions (classroom-core).
pub mod core;
pub mod handlers;

pub use classroom_core::{
    ActionRateLimit, AppConfig, AppContext, AppError, AppPlugin, AppRequest, AppResponse,
    AppResult, AppRoute, BodyLimitConfig, BodyLimitMiddleware, CacheAdapter, ConfigError,
    DatabaseAdapter, DatabaseError, EnvConfig, GovernorRateLimiter, HttpMethod, LogLevel,
    Logger, MemoryCacheAdapter, MemoryLogger, Middleware, QueryCache, RateLimitConfig,
    RateLimitDecision, RateLimiter, Role, SameSite, SessionConfig, SlidingWindowRateLimiter,
    TracingLogger, UploadConfig,
};

pub mod types {
    pub use classroom_core::{
        AppRequest, AppResponse, Assignment, Course, CourseStatus, CreateAssignment,
        CreateCourse, CreateFile, CreateMembership, CreateQuiz, CreateQuizAttempt,
        CreateSubmission, CreateUser, Grade, HealthCheckResponse, HttpMethod, MembershipStatus,
        ProgressReportRow, Quiz, QuizAttempt, QuizQuestion, SchoolReportRow, Session,
        Submission, SuccessResponse, TenantMembership, UpdateAssignment, UploadedFile,
        UpsertGrade, User,
    };
}

pub mod adapters {
    pub use classroom_core::{
        AssignmentOps, CacheAdapter, CourseOps, DatabaseAdapter, FileOps, GradeOps,
        IdentityProvider, MembershipOps, MemoryCacheAdapter, MemoryDatabaseAdapter,
        MemoryIdentityProvider, QuizOps, SubmissionOps,
    };
}

pub mod plugins {
    pub use classroom_api::action::{ActionCaller, ServerAction, run_action};
    pub use classroom_api::plugins::*;
}

pub use core::{Classroom, ClassroomBuilder, TypedClassroomBuilder};

#[cfg(feature = "axum")]
pub use handlers::axum::AxumIntegration;
