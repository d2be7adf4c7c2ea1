use async_trait::async_trait;
use serde::Deserialize;
use validator::Validate;

use classroom_core::roles::Role;
use classroom_core::{
    AppContext, AppError, AppPlugin, AppRequest, AppResponse, AppResult, AppRoute,
    CreateSubmission, DatabaseAdapter, HttpMethod, Submission,
};

use super::helpers::{load_assignment, require_enrolled};
use crate::action::{ActionCaller, STUDENT_ROLES, ServerAction, run_action};

/// Assignment hand-in.
pub struct SubmissionPlugin;

impl SubmissionPlugin {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct SubmitAssignmentInput {
    #[validate(length(min = 1, message = "Assignment is required"))]
    pub assignment_id: String,
    #[validate(length(max = 50000, message = "Content must be at most 50000 characters"))]
    pub content: Option<String>,
    #[validate(length(min = 1, message = "File id must not be empty"))]
    pub file_id: Option<String>,
}

pub struct SubmitAssignmentAction;

#[async_trait]
impl<DB: DatabaseAdapter> ServerAction<DB> for SubmitAssignmentAction {
    type Input = SubmitAssignmentInput;
    type Output = Submission;

    fn name(&self) -> &'static str {
        "submit-assignment"
    }

    fn allowed_roles(&self) -> Option<&'static [Role]> {
        Some(STUDENT_ROLES)
    }

    async fn perform(
        &self,
        input: SubmitAssignmentInput,
        caller: &ActionCaller,
        ctx: &AppContext<DB>,
    ) -> AppResult<Submission> {
        let user = caller.user()?;
        let content = input.content.filter(|c| !c.trim().is_empty());
        if content.is_none() && input.file_id.is_none() {
            return Err(AppError::invalid_field(
                "content",
                "Provide the submission text or an uploaded file",
            ));
        }

        let assignment = load_assignment(ctx, &input.assignment_id).await?;
        require_enrolled(ctx, &assignment.course_id, &user.id).await?;

        if let Some(file_id) = &input.file_id {
            let owned = ctx
                .database
                .get_file(file_id)
                .await?
                .is_some_and(|file| file.owner_id == user.id);
            if !owned {
                return Err(AppError::invalid_field("file_id", "File not found"));
            }
        }

        // A second hand-in hits the (assignment, student) unique key.
        ctx.database
            .create_submission(CreateSubmission {
                assignment_id: assignment.id,
                student_id: user.id.clone(),
                content,
                file_id: input.file_id,
            })
            .await
    }
}

#[async_trait]
impl<DB: DatabaseAdapter> AppPlugin<DB> for SubmissionPlugin {
    fn name(&self) -> &'static str {
        "submission"
    }

    fn routes(&self) -> Vec<AppRoute> {
        vec![AppRoute::post(
            "/actions/submissions/create",
            "submit_assignment",
        )]
    }

    async fn on_request(
        &self,
        req: &AppRequest,
        ctx: &AppContext<DB>,
    ) -> AppResult<Option<AppResponse>> {
        match (req.method(), req.path()) {
            (HttpMethod::Post, "/actions/submissions/create") => {
                Ok(Some(run_action(&SubmitAssignmentAction, req, ctx).await?))
            }
            _ => Ok(None),
        }
    }
}
