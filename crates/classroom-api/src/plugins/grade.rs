use async_trait::async_trait;
use serde::Deserialize;
use validator::Validate;

use classroom_core::roles::Role;
use classroom_core::{
    AppContext, AppError, AppPlugin, AppRequest, AppResponse, AppResult, AppRoute,
    DatabaseAdapter, Grade, HttpMethod, SuccessResponse, UpsertGrade,
};

use super::helpers::{
    can_view_student, load_assignment, require_course_staff, required_query, student_grades_tag,
};
use crate::action::{ActionCaller, STAFF_ROLES, ServerAction, run_action};

/// Grade posting and the cached per-student grade list.
pub struct GradePlugin;

impl GradePlugin {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }

    async fn handle_list<DB: DatabaseAdapter>(
        &self,
        req: &AppRequest,
        ctx: &AppContext<DB>,
    ) -> AppResult<AppResponse> {
        let (user, _session) = ctx.require_session(req).await?;
        let student_id = required_query(req, "studentId")?;

        if !can_view_student(ctx, &user, student_id).await? {
            return Err(AppError::forbidden("You may not view these grades"));
        }

        let tag = student_grades_tag(student_id);
        let grades: Vec<Grade> = ctx
            .cache
            .get_or_compute(
                &format!("grades:{}", student_id),
                &[tag.as_str()],
                || ctx.database.list_student_grades(student_id),
            )
            .await?;

        Ok(AppResponse::json(200, &SuccessResponse::new(grades))?)
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct PostGradeInput {
    #[validate(length(min = 1, message = "Assignment is required"))]
    pub assignment_id: String,
    #[validate(length(min = 1, message = "Student is required"))]
    pub student_id: String,
    #[validate(range(min = 0.0, message = "Score must not be negative"))]
    pub score: f64,
    #[validate(length(max = 2000, message = "Feedback must be at most 2000 characters"))]
    pub feedback: Option<String>,
}

pub struct PostGradeAction;

#[async_trait]
impl<DB: DatabaseAdapter> ServerAction<DB> for PostGradeAction {
    type Input = PostGradeInput;
    type Output = Grade;

    fn name(&self) -> &'static str {
        "post-grade"
    }

    fn allowed_roles(&self) -> Option<&'static [Role]> {
        Some(STAFF_ROLES)
    }

    async fn perform(
        &self,
        input: PostGradeInput,
        caller: &ActionCaller,
        ctx: &AppContext<DB>,
    ) -> AppResult<Grade> {
        let user = caller.user()?;
        let assignment = load_assignment(ctx, &input.assignment_id).await?;
        require_course_staff(ctx, user, &assignment.course_id).await?;

        if input.score > assignment.max_score {
            return Err(AppError::invalid_field(
                "score",
                format!("Score must not exceed {}", assignment.max_score),
            ));
        }
        if !ctx
            .database
            .is_enrolled(&assignment.course_id, &input.student_id)
            .await?
        {
            return Err(AppError::invalid_field(
                "student_id",
                "Student is not enrolled in this course",
            ));
        }

        let grade = ctx
            .database
            .upsert_grade(UpsertGrade {
                assignment_id: assignment.id,
                student_id: input.student_id,
                score: input.score,
                feedback: input.feedback,
                graded_by: user.id.clone(),
            })
            .await?;

        ctx.cache
            .invalidate_tag(&student_grades_tag(&grade.student_id))
            .await?;
        Ok(grade)
    }
}

#[async_trait]
impl<DB: DatabaseAdapter> AppPlugin<DB> for GradePlugin {
    fn name(&self) -> &'static str {
        "grade"
    }

    fn routes(&self) -> Vec<AppRoute> {
        vec![
            AppRoute::post("/actions/grades/post", "post_grade"),
            AppRoute::get("/api/grades", "list_grades"),
        ]
    }

    async fn on_request(
        &self,
        req: &AppRequest,
        ctx: &AppContext<DB>,
    ) -> AppResult<Option<AppResponse>> {
        match (req.method(), req.path()) {
            (HttpMethod::Post, "/actions/grades/post") => {
                Ok(Some(run_action(&PostGradeAction, req, ctx).await?))
            }
            (HttpMethod::Get, "/api/grades") => Ok(Some(self.handle_list(req, ctx).await?)),
            _ => Ok(None),
        }
    }
}
