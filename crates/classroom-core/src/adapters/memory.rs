use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::traits::{
    AssignmentOps, CourseOps, FileOps, GradeOps, MembershipOps, QuizOps, SubmissionOps,
};
use crate::error::{AppError, AppResult, DatabaseError};
use crate::types::{
    Assignment, Course, CreateAssignment, CreateCourse, CreateFile, CreateMembership, CreateQuiz,
    CreateQuizAttempt, CreateSubmission, Grade, Quiz, QuizAttempt, Submission, TenantMembership,
    UpdateAssignment, UploadedFile, UpsertGrade,
};

/// In-memory database adapter for testing and development.
///
/// Rows keep insertion order where the hosted database would need an
/// explicit `ORDER BY created_at`.
pub struct MemoryDatabaseAdapter {
    memberships: Mutex<Vec<TenantMembership>>,
    courses: Mutex<HashMap<String, Course>>,
    enrollments: Mutex<HashSet<(String, String)>>,
    parent_links: Mutex<HashSet<(String, String)>>,
    assignments: Mutex<Vec<Assignment>>,
    grades: Mutex<Vec<Grade>>,
    quizzes: Mutex<HashMap<String, Quiz>>,
    quiz_attempts: Mutex<Vec<QuizAttempt>>,
    submissions: Mutex<Vec<Submission>>,
    files: Mutex<HashMap<String, UploadedFile>>,
    writes: AtomicUsize,
}

impl MemoryDatabaseAdapter {
    pub fn new() -> Self {
        Self {
            memberships: Mutex::new(Vec::new()),
            courses: Mutex::new(HashMap::new()),
            enrollments: Mutex::new(HashSet::new()),
            parent_links: Mutex::new(HashSet::new()),
            assignments: Mutex::new(Vec::new()),
            grades: Mutex::new(Vec::new()),
            quizzes: Mutex::new(HashMap::new()),
            quiz_attempts: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            files: Mutex::new(HashMap::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of write operations applied since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for MemoryDatabaseAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> AppResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| AppError::from(DatabaseError::Connection("store lock poisoned".to_string())))
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl MembershipOps for MemoryDatabaseAdapter {
    async fn create_membership(
        &self,
        create: CreateMembership,
    ) -> AppResult<TenantMembership> {
        let mut memberships = lock(&self.memberships)?;

        if memberships
            .iter()
            .any(|m| m.tenant_id == create.tenant_id && m.user_id == create.user_id)
        {
            return Err(DatabaseError::Constraint(format!(
                "user {} already belongs to tenant {}",
                create.user_id, create.tenant_id
            ))
            .into());
        }

        let membership = TenantMembership {
            id: new_id(),
            tenant_id: create.tenant_id,
            user_id: create.user_id,
            role: create.role,
            status: create.status,
            created_at: Utc::now(),
        };
        memberships.push(membership.clone());
        self.record_write();
        Ok(membership)
    }

    async fn first_active_membership(
        &self,
        user_id: &str,
    ) -> AppResult<Option<TenantMembership>> {
        let memberships = lock(&self.memberships)?;
        Ok(memberships
            .iter()
            .find(|m| m.user_id == user_id && m.is_active())
            .cloned())
    }

    async fn get_membership(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> AppResult<Option<TenantMembership>> {
        let memberships = lock(&self.memberships)?;
        Ok(memberships
            .iter()
            .find(|m| m.tenant_id == tenant_id && m.user_id == user_id)
            .cloned())
    }

    async fn list_user_memberships(&self, user_id: &str) -> AppResult<Vec<TenantMembership>> {
        let memberships = lock(&self.memberships)?;
        Ok(memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CourseOps for MemoryDatabaseAdapter {
    async fn create_course(&self, create: CreateCourse) -> AppResult<Course> {
        let mut courses = lock(&self.courses)?;
        let now = Utc::now();
        let course = Course {
            id: new_id(),
            tenant_id: create.tenant_id,
            name: create.name,
            teacher_id: create.teacher_id,
            status: create.status,
            created_at: now,
            updated_at: now,
        };
        courses.insert(course.id.clone(), course.clone());
        self.record_write();
        Ok(course)
    }

    async fn get_course(&self, id: &str) -> AppResult<Option<Course>> {
        let courses = lock(&self.courses)?;
        Ok(courses.get(id).cloned())
    }

    async fn list_tenant_courses(&self, tenant_id: &str) -> AppResult<Vec<Course>> {
        let courses = lock(&self.courses)?;
        let mut list: Vec<Course> = courses
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(list)
    }

    async fn enroll_student(&self, course_id: &str, student_id: &str) -> AppResult<()> {
        let mut enrollments = lock(&self.enrollments)?;
        if enrollments.insert((course_id.to_string(), student_id.to_string())) {
            self.record_write();
        }
        Ok(())
    }

    async fn is_enrolled(&self, course_id: &str, student_id: &str) -> AppResult<bool> {
        let enrollments = lock(&self.enrollments)?;
        Ok(enrollments.contains(&(course_id.to_string(), student_id.to_string())))
    }

    async fn count_course_students(&self, course_id: &str) -> AppResult<usize> {
        let enrollments = lock(&self.enrollments)?;
        Ok(enrollments.iter().filter(|(c, _)| c == course_id).count())
    }

    async fn list_student_courses(&self, student_id: &str) -> AppResult<Vec<Course>> {
        let course_ids: Vec<String> = {
            let enrollments = lock(&self.enrollments)?;
            enrollments
                .iter()
                .filter(|(_, s)| s == student_id)
                .map(|(c, _)| c.clone())
                .collect()
        };

        let courses = lock(&self.courses)?;
        let mut list: Vec<Course> = course_ids
            .iter()
            .filter_map(|id| courses.get(id).cloned())
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    async fn link_parent(&self, parent_id: &str, student_id: &str) -> AppResult<()> {
        let mut links = lock(&self.parent_links)?;
        if links.insert((parent_id.to_string(), student_id.to_string())) {
            self.record_write();
        }
        Ok(())
    }

    async fn is_parent_of(&self, parent_id: &str, student_id: &str) -> AppResult<bool> {
        let links = lock(&self.parent_links)?;
        Ok(links.contains(&(parent_id.to_string(), student_id.to_string())))
    }
}

#[async_trait]
impl AssignmentOps for MemoryDatabaseAdapter {
    async fn create_assignment(&self, create: CreateAssignment) -> AppResult<Assignment> {
        let mut assignments = lock(&self.assignments)?;
        let now = Utc::now();
        let assignment = Assignment {
            id: new_id(),
            course_id: create.course_id,
            title: create.title,
            description: create.description,
            due_at: create.due_at,
            max_score: create.max_score,
            created_by: create.created_by,
            created_at: now,
            updated_at: now,
        };
        assignments.push(assignment.clone());
        self.record_write();
        Ok(assignment)
    }

    async fn get_assignment(&self, id: &str) -> AppResult<Option<Assignment>> {
        let assignments = lock(&self.assignments)?;
        Ok(assignments.iter().find(|a| a.id == id).cloned())
    }

    async fn update_assignment(
        &self,
        id: &str,
        update: UpdateAssignment,
    ) -> AppResult<Assignment> {
        let mut assignments = lock(&self.assignments)?;
        let assignment = assignments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| DatabaseError::RecordNotFound(format!("assignment {}", id)))?;

        if let Some(title) = update.title {
            assignment.title = title;
        }
        if let Some(description) = update.description {
            assignment.description = Some(description);
        }
        if let Some(due_at) = update.due_at {
            assignment.due_at = Some(due_at);
        }
        if let Some(max_score) = update.max_score {
            assignment.max_score = max_score;
        }
        assignment.updated_at = Utc::now();

        let updated = assignment.clone();
        self.record_write();
        Ok(updated)
    }

    async fn delete_assignment(&self, id: &str) -> AppResult<()> {
        let mut assignments = lock(&self.assignments)?;
        let before = assignments.len();
        assignments.retain(|a| a.id != id);
        if assignments.len() == before {
            return Err(DatabaseError::RecordNotFound(format!("assignment {}", id)).into());
        }
        self.record_write();
        Ok(())
    }

    async fn list_course_assignments(&self, course_id: &str) -> AppResult<Vec<Assignment>> {
        let assignments = lock(&self.assignments)?;
        Ok(assignments
            .iter()
            .filter(|a| a.course_id == course_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl GradeOps for MemoryDatabaseAdapter {
    async fn upsert_grade(&self, upsert: UpsertGrade) -> AppResult<Grade> {
        let mut grades = lock(&self.grades)?;
        let now = Utc::now();

        let grade = match grades.iter_mut().find(|g| {
            g.assignment_id == upsert.assignment_id && g.student_id == upsert.student_id
        }) {
            Some(existing) => {
                existing.score = upsert.score;
                existing.feedback = upsert.feedback;
                existing.graded_by = upsert.graded_by;
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let grade = Grade {
                    id: new_id(),
                    assignment_id: upsert.assignment_id,
                    student_id: upsert.student_id,
                    score: upsert.score,
                    feedback: upsert.feedback,
                    graded_by: upsert.graded_by,
                    created_at: now,
                    updated_at: now,
                };
                grades.push(grade.clone());
                grade
            }
        };

        self.record_write();
        Ok(grade)
    }

    async fn get_grade(&self, assignment_id: &str, student_id: &str) -> AppResult<Option<Grade>> {
        let grades = lock(&self.grades)?;
        Ok(grades
            .iter()
            .find(|g| g.assignment_id == assignment_id && g.student_id == student_id)
            .cloned())
    }

    async fn list_student_grades(&self, student_id: &str) -> AppResult<Vec<Grade>> {
        let grades = lock(&self.grades)?;
        Ok(grades
            .iter()
            .filter(|g| g.student_id == student_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QuizOps for MemoryDatabaseAdapter {
    async fn create_quiz(&self, create: CreateQuiz) -> AppResult<Quiz> {
        let mut quizzes = lock(&self.quizzes)?;
        let quiz = Quiz {
            id: new_id(),
            course_id: create.course_id,
            title: create.title,
            questions: create.questions,
            time_limit_minutes: create.time_limit_minutes,
            published: false,
            created_by: create.created_by,
            created_at: Utc::now(),
        };
        quizzes.insert(quiz.id.clone(), quiz.clone());
        self.record_write();
        Ok(quiz)
    }

    async fn get_quiz(&self, id: &str) -> AppResult<Option<Quiz>> {
        let quizzes = lock(&self.quizzes)?;
        Ok(quizzes.get(id).cloned())
    }

    async fn set_quiz_published(&self, id: &str, published: bool) -> AppResult<Quiz> {
        let mut quizzes = lock(&self.quizzes)?;
        let quiz = quizzes
            .get_mut(id)
            .ok_or_else(|| DatabaseError::RecordNotFound(format!("quiz {}", id)))?;
        quiz.published = published;
        let updated = quiz.clone();
        self.record_write();
        Ok(updated)
    }

    async fn create_quiz_attempt(&self, create: CreateQuizAttempt) -> AppResult<QuizAttempt> {
        let mut attempts = lock(&self.quiz_attempts)?;

        if attempts
            .iter()
            .any(|a| a.quiz_id == create.quiz_id && a.student_id == create.student_id)
        {
            return Err(DatabaseError::Constraint(
                "duplicate key value violates unique constraint \"quiz_attempts_quiz_student_key\""
                    .to_string(),
            )
            .into());
        }

        let attempt = QuizAttempt {
            id: new_id(),
            quiz_id: create.quiz_id,
            student_id: create.student_id,
            answers: create.answers,
            score: create.score,
            max_score: create.max_score,
            submitted_at: Utc::now(),
        };
        attempts.push(attempt.clone());
        self.record_write();
        Ok(attempt)
    }

    async fn list_quiz_attempts(
        &self,
        quiz_id: &str,
        student_id: &str,
    ) -> AppResult<Vec<QuizAttempt>> {
        let attempts = lock(&self.quiz_attempts)?;
        Ok(attempts
            .iter()
            .filter(|a| a.quiz_id == quiz_id && a.student_id == student_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SubmissionOps for MemoryDatabaseAdapter {
    async fn create_submission(&self, create: CreateSubmission) -> AppResult<Submission> {
        let mut submissions = lock(&self.submissions)?;

        if submissions
            .iter()
            .any(|s| s.assignment_id == create.assignment_id && s.student_id == create.student_id)
        {
            return Err(DatabaseError::Constraint(
                "duplicate key value violates unique constraint \"submissions_assignment_student_key\""
                    .to_string(),
            )
            .into());
        }

        let submission = Submission {
            id: new_id(),
            assignment_id: create.assignment_id,
            student_id: create.student_id,
            content: create.content,
            file_id: create.file_id,
            submitted_at: Utc::now(),
        };
        submissions.push(submission.clone());
        self.record_write();
        Ok(submission)
    }

    async fn get_submission(
        &self,
        assignment_id: &str,
        student_id: &str,
    ) -> AppResult<Option<Submission>> {
        let submissions = lock(&self.submissions)?;
        Ok(submissions
            .iter()
            .find(|s| s.assignment_id == assignment_id && s.student_id == student_id)
            .cloned())
    }
}

#[async_trait]
impl FileOps for MemoryDatabaseAdapter {
    async fn create_file(&self, create: CreateFile) -> AppResult<UploadedFile> {
        let mut files = lock(&self.files)?;
        let file = UploadedFile {
            id: new_id(),
            owner_id: create.owner_id,
            file_name: create.file_name,
            content_type: create.content_type,
            size: create.size,
            created_at: Utc::now(),
        };
        files.insert(file.id.clone(), file.clone());
        self.record_write();
        Ok(file)
    }

    async fn get_file(&self, id: &str) -> AppResult<Option<UploadedFile>> {
        let files = lock(&self.files)?;
        Ok(files.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MembershipStatus;

    #[tokio::test]
    async fn test_first_active_membership_uses_insertion_order() {
        let db = MemoryDatabaseAdapter::new();
        db.create_membership(CreateMembership::new("t1", "u1", "parent"))
            .await
            .unwrap();
        db.create_membership(CreateMembership::new("t2", "u1", "teacher"))
            .await
            .unwrap();

        let first = db.first_active_membership("u1").await.unwrap().unwrap();
        assert_eq!(first.tenant_id, "t1");
        assert_eq!(first.status, MembershipStatus::Active);
    }

    #[tokio::test]
    async fn test_duplicate_membership_is_rejected() {
        let db = MemoryDatabaseAdapter::new();
        db.create_membership(CreateMembership::new("t1", "u1", "parent"))
            .await
            .unwrap();
        let err = db
            .create_membership(CreateMembership::new("t1", "u1", "teacher"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(DatabaseError::Constraint(_))));
        assert_eq!(db.write_count(), 1);
    }

    #[tokio::test]
    async fn test_upsert_grade_replaces_existing() {
        let db = MemoryDatabaseAdapter::new();
        let first = db
            .upsert_grade(UpsertGrade {
                assignment_id: "a1".to_string(),
                student_id: "s1".to_string(),
                score: 70.0,
                feedback: None,
                graded_by: "t1".to_string(),
            })
            .await
            .unwrap();
        let second = db
            .upsert_grade(UpsertGrade {
                assignment_id: "a1".to_string(),
                student_id: "s1".to_string(),
                score: 85.0,
                feedback: Some("Better".to_string()),
                graded_by: "t1".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(db.list_student_grades("s1").await.unwrap().len(), 1);
        assert_eq!(
            db.get_grade("a1", "s1").await.unwrap().unwrap().score,
            85.0
        );
    }

    #[tokio::test]
    async fn test_enrollment_is_idempotent() {
        let db = MemoryDatabaseAdapter::new();
        let course = db
            .create_course(CreateCourse::new("t1", "Biology", "teacher-1"))
            .await
            .unwrap();
        db.enroll_student(&course.id, "s1").await.unwrap();
        db.enroll_student(&course.id, "s1").await.unwrap();
        db.enroll_student(&course.id, "s2").await.unwrap();

        assert_eq!(db.count_course_students(&course.id).await.unwrap(), 2);
        assert!(db.is_enrolled(&course.id, "s1").await.unwrap());
        assert_eq!(db.list_student_courses("s2").await.unwrap().len(), 1);
    }

    fn attempt(quiz_id: &str, student_id: &str) -> CreateQuizAttempt {
        CreateQuizAttempt {
            quiz_id: quiz_id.to_string(),
            student_id: student_id.to_string(),
            answers: vec![Some(1)],
            score: 1.0,
            max_score: 1.0,
        }
    }

    #[tokio::test]
    async fn test_one_quiz_attempt_per_student() {
        let db = MemoryDatabaseAdapter::new();
        let (first, second) = tokio::join!(
            db.create_quiz_attempt(attempt("q1", "s1")),
            db.create_quiz_attempt(attempt("q1", "s1")),
        );

        let errors: Vec<AppError> = [first, second].into_iter().filter_map(Result::err).collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], AppError::Database(DatabaseError::Constraint(_))));
        assert_eq!(db.write_count(), 1);

        db.create_quiz_attempt(attempt("q1", "s2")).await.unwrap();
        db.create_quiz_attempt(attempt("q2", "s1")).await.unwrap();
        assert_eq!(db.list_quiz_attempts("q1", "s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_poisoned_store_is_a_connection_error() {
        let db = MemoryDatabaseAdapter::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = db.quiz_attempts.lock().unwrap();
            panic!("writer died mid-update");
        }));

        let err = db.list_quiz_attempts("q1", "s1").await.unwrap_err();
        assert!(matches!(err, AppError::Database(DatabaseError::Connection(_))));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_delete_missing_assignment() {
        let db = MemoryDatabaseAdapter::new();
        let err = db.delete_assignment("nope").await.unwrap_err();
        assert_eq!(err.to_string(), "Record not found: assignment nope");
    }
}
