use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use classroom_core::roles::Role;
use classroom_core::{
    AppContext, AppError, AppPlugin, AppRequest, AppResponse, AppResult, AppRoute, Assignment,
    CreateAssignment, DatabaseAdapter, HttpMethod, SuccessResponse, UpdateAssignment,
};

use super::helpers::{
    course_assignments_tag, load_assignment, require_course_staff, required_query,
};
use crate::action::{ActionCaller, STAFF_ROLES, ServerAction, run_action};

/// Assignment authoring actions and the cached assignment list.
pub struct AssignmentPlugin;

impl AssignmentPlugin {
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
        let course_id = required_query(req, "courseId")?;

        let course = ctx
            .database
            .get_course(course_id)
            .await?
            .ok_or_else(|| AppError::not_found("Course not found"))?;

        let is_student = ctx.database.is_enrolled(&course.id, &user.id).await?;
        if !is_student {
            require_course_staff(ctx, &user, &course.id).await?;
        }

        let tag = course_assignments_tag(&course.id);
        let assignments: Vec<Assignment> = ctx
            .cache
            .get_or_compute(
                &format!("assignments:{}", course.id),
                &[tag.as_str()],
                || ctx.database.list_course_assignments(&course.id),
            )
            .await?;

        Ok(AppResponse::json(200, &SuccessResponse::new(assignments))?)
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateAssignmentInput {
    #[validate(length(min = 1, message = "Course is required"))]
    pub course_id: String,
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    #[validate(range(
        exclusive_min = 0.0,
        max = 1000.0,
        message = "Max score must be greater than 0 and at most 1000"
    ))]
    pub max_score: f64,
}

pub struct CreateAssignmentAction;

#[async_trait]
impl<DB: DatabaseAdapter> ServerAction<DB> for CreateAssignmentAction {
    type Input = CreateAssignmentInput;
    type Output = Assignment;

    fn name(&self) -> &'static str {
        "create-assignment"
    }

    fn allowed_roles(&self) -> Option<&'static [Role]> {
        Some(STAFF_ROLES)
    }

    async fn perform(
        &self,
        input: CreateAssignmentInput,
        caller: &ActionCaller,
        ctx: &AppContext<DB>,
    ) -> AppResult<Assignment> {
        let user = caller.user()?;
        let course = require_course_staff(ctx, user, &input.course_id).await?;

        let assignment = ctx
            .database
            .create_assignment(CreateAssignment {
                course_id: course.id,
                title: input.title,
                description: input.description,
                due_at: input.due_at,
                max_score: input.max_score,
                created_by: user.id.clone(),
            })
            .await?;

        ctx.cache
            .invalidate_tag(&course_assignments_tag(&assignment.course_id))
            .await?;
        Ok(assignment)
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateAssignmentInput {
    #[validate(length(min = 1, message = "Assignment is required"))]
    pub assignment_id: String,
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    #[validate(range(
        exclusive_min = 0.0,
        max = 1000.0,
        message = "Max score must be greater than 0 and at most 1000"
    ))]
    pub max_score: Option<f64>,
}

pub struct UpdateAssignmentAction;

#[async_trait]
impl<DB: DatabaseAdapter> ServerAction<DB> for UpdateAssignmentAction {
    type Input = UpdateAssignmentInput;
    type Output = Assignment;

    fn name(&self) -> &'static str {
        "update-assignment"
    }

    fn allowed_roles(&self) -> Option<&'static [Role]> {
        Some(STAFF_ROLES)
    }

    async fn perform(
        &self,
        input: UpdateAssignmentInput,
        caller: &ActionCaller,
        ctx: &AppContext<DB>,
    ) -> AppResult<Assignment> {
        let user = caller.user()?;
        let existing = load_assignment(ctx, &input.assignment_id).await?;
        require_course_staff(ctx, user, &existing.course_id).await?;

        let assignment = ctx
            .database
            .update_assignment(
                &existing.id,
                UpdateAssignment {
                    title: input.title,
                    description: input.description,
                    due_at: input.due_at,
                    max_score: input.max_score,
                },
            )
            .await?;

        ctx.cache
            .invalidate_tag(&course_assignments_tag(&assignment.course_id))
            .await?;
        Ok(assignment)
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteAssignmentInput {
    #[validate(length(min = 1, message = "Assignment is required"))]
    pub assignment_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeletedAssignment {
    pub id: String,
}

pub struct DeleteAssignmentAction;

#[async_trait]
impl<DB: DatabaseAdapter> ServerAction<DB> for DeleteAssignmentAction {
    type Input = DeleteAssignmentInput;
    type Output = DeletedAssignment;

    fn name(&self) -> &'static str {
        "delete-assignment"
    }

    fn allowed_roles(&self) -> Option<&'static [Role]> {
        Some(STAFF_ROLES)
    }

    async fn perform(
        &self,
        input: DeleteAssignmentInput,
        caller: &ActionCaller,
        ctx: &AppContext<DB>,
    ) -> AppResult<DeletedAssignment> {
        let user = caller.user()?;
        let existing = load_assignment(ctx, &input.assignment_id).await?;
        require_course_staff(ctx, user, &existing.course_id).await?;

        ctx.database.delete_assignment(&existing.id).await?;

        ctx.cache
            .invalidate_tag(&course_assignments_tag(&existing.course_id))
            .await?;
        Ok(DeletedAssignment { id: existing.id })
    }
}

#[async_trait]
impl<DB: DatabaseAdapter> AppPlugin<DB> for AssignmentPlugin {
    fn name(&self) -> &'static str {
        "assignment"
    }

    fn routes(&self) -> Vec<AppRoute> {
        vec![
            AppRoute::post("/actions/assignments/create", "create_assignment"),
            AppRoute::post("/actions/assignments/update", "update_assignment"),
            AppRoute::post("/actions/assignments/delete", "delete_assignment"),
            AppRoute::get("/api/assignments", "list_assignments"),
        ]
    }

    async fn on_request(
        &self,
        req: &AppRequest,
        ctx: &AppContext<DB>,
    ) -> AppResult<Option<AppResponse>> {
        match (req.method(), req.path()) {
            (HttpMethod::Post, "/actions/assignments/create") => {
                Ok(Some(run_action(&CreateAssignmentAction, req, ctx).await?))
            }
            (HttpMethod::Post, "/actions/assignments/update") => {
                Ok(Some(run_action(&UpdateAssignmentAction, req, ctx).await?))
            }
            (HttpMethod::Post, "/actions/assignments/delete") => {
                Ok(Some(run_action(&DeleteAssignmentAction, req, ctx).await?))
            }
            (HttpMethod::Get, "/api/assignments") => Ok(Some(self.handle_list(req, ctx).await?)),
            _ => Ok(None),
        }
    }
}
