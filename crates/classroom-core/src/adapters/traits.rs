use async_trait::async_trait;

use crate::error::AppResult;
use crate::types::{
    Assignment, Course, CreateAssignment, CreateCourse, CreateFile, CreateMembership, CreateQuiz,
    CreateQuizAttempt, CreateSubmission, Grade, Quiz, QuizAttempt, Submission, TenantMembership,
    UpdateAssignment, UploadedFile, UpsertGrade,
};

/// Tenant membership persistence operations.
#[async_trait]
pub trait MembershipOps: Send + Sync + 'static {
    async fn create_membership(&self, membership: CreateMembership)
    -> AppResult<TenantMembership>;

    /// First active membership of a user, oldest first.
    async fn first_active_membership(&self, user_id: &str)
    -> AppResult<Option<TenantMembership>>;

    async fn get_membership(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> AppResult<Option<TenantMembership>>;

    async fn list_user_memberships(&self, user_id: &str) -> AppResult<Vec<TenantMembership>>;
}

/// Course, enrollment and family-link operations.
#[async_trait]
pub trait CourseOps: Send + Sync + 'static {
    async fn create_course(&self, course: CreateCourse) -> AppResult<Course>;
    async fn get_course(&self, id: &str) -> AppResult<Option<Course>>;
    async fn list_tenant_courses(&self, tenant_id: &str) -> AppResult<Vec<Course>>;
    async fn enroll_student(&self, course_id: &str, student_id: &str) -> AppResult<()>;
    async fn is_enrolled(&self, course_id: &str, student_id: &str) -> AppResult<bool>;
    async fn count_course_students(&self, course_id: &str) -> AppResult<usize>;
    async fn list_student_courses(&self, student_id: &str) -> AppResult<Vec<Course>>;
    async fn link_parent(&self, parent_id: &str, student_id: &str) -> AppResult<()>;
    async fn is_parent_of(&self, parent_id: &str, student_id: &str) -> AppResult<bool>;
}

/// Assignment persistence operations.
#[async_trait]
pub trait AssignmentOps: Send + Sync + 'static {
    async fn create_assignment(&self, assignment: CreateAssignment) -> AppResult<Assignment>;
    async fn get_assignment(&self, id: &str) -> AppResult<Option<Assignment>>;
    async fn update_assignment(&self, id: &str, update: UpdateAssignment)
    -> AppResult<Assignment>;
    async fn delete_assignment(&self, id: &str) -> AppResult<()>;
    async fn list_course_assignments(&self, course_id: &str) -> AppResult<Vec<Assignment>>;
}

/// Grade persistence operations.
#[async_trait]
pub trait GradeOps: Send + Sync + 'static {
    async fn upsert_grade(&self, grade: UpsertGrade) -> AppResult<Grade>;
    async fn get_grade(&self, assignment_id: &str, student_id: &str)
    -> AppResult<Option<Grade>>;
    async fn list_student_grades(&self, student_id: &str) -> AppResult<Vec<Grade>>;
}

/// Quiz and quiz-attempt persistence operations.
#[async_trait]
pub trait QuizOps: Send + Sync + 'static {
    async fn create_quiz(&self, quiz: CreateQuiz) -> AppResult<Quiz>;
    async fn get_quiz(&self, id: &str) -> AppResult<Option<Quiz>>;
    async fn set_quiz_published(&self, id: &str, published: bool) -> AppResult<Quiz>;
    async fn create_quiz_attempt(&self, attempt: CreateQuizAttempt) -> AppResult<QuizAttempt>;
    async fn list_quiz_attempts(&self, quiz_id: &str, student_id: &str)
    -> AppResult<Vec<QuizAttempt>>;
}

/// Assignment submission persistence operations.
#[async_trait]
pub trait SubmissionOps: Send + Sync + 'static {
    async fn create_submission(&self, submission: CreateSubmission) -> AppResult<Submission>;
    async fn get_submission(
        &self,
        assignment_id: &str,
        student_id: &str,
    ) -> AppResult<Option<Submission>>;
}

/// Uploaded file metadata operations.
#[async_trait]
pub trait FileOps: Send + Sync + 'static {
    async fn create_file(&self, file: CreateFile) -> AppResult<UploadedFile>;
    async fn get_file(&self, id: &str) -> AppResult<Option<UploadedFile>>;
}
