use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use classroom_core::grading::{max_quiz_score, score_quiz};
use classroom_core::roles::Role;
use classroom_core::{
    AppContext, AppError, AppPlugin, AppRequest, AppResponse, AppResult, AppRoute, CreateQuiz,
    CreateQuizAttempt, DatabaseAdapter, DatabaseError, HttpMethod, Quiz, QuizAttempt,
    QuizQuestion,
};

use super::helpers::{require_course_staff, require_enrolled};
use crate::action::{ActionCaller, STAFF_ROLES, STUDENT_ROLES, ServerAction, run_action};

/// Quiz authoring, publishing and student attempts.
pub struct QuizPlugin;

impl QuizPlugin {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

async fn load_quiz<DB: DatabaseAdapter>(ctx: &AppContext<DB>, quiz_id: &str) -> AppResult<Quiz> {
    ctx.database
        .get_quiz(quiz_id)
        .await?
        .ok_or_else(|| AppError::not_found("Quiz not found"))
}

#[derive(Debug, Default, Deserialize, Serialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 1000, message = "Prompt must be between 1 and 1000 characters"))]
    pub prompt: String,
    #[validate(length(min = 2, max = 10, message = "A question needs between 2 and 10 options"))]
    pub options: Vec<String>,
    pub correct_option: usize,
    #[validate(range(
        exclusive_min = 0.0,
        max = 100.0,
        message = "Points must be greater than 0 and at most 100"
    ))]
    pub points: f64,
}

impl From<QuestionInput> for QuizQuestion {
    fn from(input: QuestionInput) -> Self {
        Self {
            prompt: input.prompt,
            options: input.options,
            correct_option: input.correct_option,
            points: input.points,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateQuizInput {
    #[validate(length(min = 1, message = "Course is required"))]
    pub course_id: String,
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(
        length(min = 1, max = 100, message = "A quiz needs between 1 and 100 questions"),
        nested
    )]
    pub questions: Vec<QuestionInput>,
    #[validate(range(min = 1, max = 600, message = "Time limit must be between 1 and 600 minutes"))]
    pub time_limit_minutes: Option<u32>,
}

pub struct CreateQuizAction;

#[async_trait]
impl<DB: DatabaseAdapter> ServerAction<DB> for CreateQuizAction {
    type Input = CreateQuizInput;
    type Output = Quiz;

    fn name(&self) -> &'static str {
        "create-quiz"
    }

    fn allowed_roles(&self) -> Option<&'static [Role]> {
        Some(STAFF_ROLES)
    }

    async fn perform(
        &self,
        input: CreateQuizInput,
        caller: &ActionCaller,
        ctx: &AppContext<DB>,
    ) -> AppResult<Quiz> {
        let user = caller.user()?;

        for (i, question) in input.questions.iter().enumerate() {
            if question.correct_option >= question.options.len() {
                return Err(AppError::invalid_field(
                    format!("questions[{}].correct_option", i),
                    "Correct option must be one of the listed options",
                ));
            }
        }

        let course = require_course_staff(ctx, user, &input.course_id).await?;

        ctx.database
            .create_quiz(CreateQuiz {
                course_id: course.id,
                title: input.title,
                questions: input.questions.into_iter().map(QuizQuestion::from).collect(),
                time_limit_minutes: input.time_limit_minutes,
                created_by: user.id.clone(),
            })
            .await
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct PublishQuizInput {
    #[validate(length(min = 1, message = "Quiz is required"))]
    pub quiz_id: String,
    /// Defaults to publishing; `false` withdraws the quiz.
    pub published: Option<bool>,
}

pub struct PublishQuizAction;

#[async_trait]
impl<DB: DatabaseAdapter> ServerAction<DB> for PublishQuizAction {
    type Input = PublishQuizInput;
    type Output = Quiz;

    fn name(&self) -> &'static str {
        "publish-quiz"
    }

    fn allowed_roles(&self) -> Option<&'static [Role]> {
        Some(STAFF_ROLES)
    }

    async fn perform(
        &self,
        input: PublishQuizInput,
        caller: &ActionCaller,
        ctx: &AppContext<DB>,
    ) -> AppResult<Quiz> {
        let user = caller.user()?;
        let quiz = load_quiz(ctx, &input.quiz_id).await?;
        require_course_staff(ctx, user, &quiz.course_id).await?;

        ctx.database
            .set_quiz_published(&quiz.id, input.published.unwrap_or(true))
            .await
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct SubmitQuizInput {
    #[validate(length(min = 1, message = "Quiz is required"))]
    pub quiz_id: String,
    /// One entry per question; `null` leaves a question unanswered.
    pub answers: Vec<Option<usize>>,
}

pub struct SubmitQuizAction;

#[async_trait]
impl<DB: DatabaseAdapter> ServerAction<DB> for SubmitQuizAction {
    type Input = SubmitQuizInput;
    type Output = QuizAttempt;

    fn name(&self) -> &'static str {
        "submit-quiz"
    }

    fn allowed_roles(&self) -> Option<&'static [Role]> {
        Some(STUDENT_ROLES)
    }

    async fn perform(
        &self,
        input: SubmitQuizInput,
        caller: &ActionCaller,
        ctx: &AppContext<DB>,
    ) -> AppResult<QuizAttempt> {
        let user = caller.user()?;
        let quiz = load_quiz(ctx, &input.quiz_id).await?;
        if !quiz.published {
            return Err(AppError::not_found("Quiz not found"));
        }
        require_enrolled(ctx, &quiz.course_id, &user.id).await?;

        if input.answers.len() != quiz.questions.len() {
            return Err(AppError::invalid_field(
                "answers",
                format!("Expected {} answers", quiz.questions.len()),
            ));
        }
        let score = score_quiz(&quiz.questions, &input.answers);
        ctx.database
            .create_quiz_attempt(CreateQuizAttempt {
                quiz_id: quiz.id,
                student_id: user.id.clone(),
                answers: input.answers,
                score,
                max_score: max_quiz_score(&quiz.questions),
            })
            .await
            .map_err(|err| match err {
                // One attempt per student, enforced by the store.
                AppError::Database(DatabaseError::Constraint(_)) => {
                    AppError::conflict("Quiz already submitted")
                }
                other => other,
            })
    }
}

#[async_trait]
impl<DB: DatabaseAdapter> AppPlugin<DB> for QuizPlugin {
    fn name(&self) -> &'static str {
        "quiz"
    }

    fn routes(&self) -> Vec<AppRoute> {
        vec![
            AppRoute::post("/actions/quizzes/create", "create_quiz"),
            AppRoute::post("/actions/quizzes/publish", "publish_quiz"),
            AppRoute::post("/actions/quizzes/submit", "submit_quiz"),
        ]
    }

    async fn on_request(
        &self,
        req: &AppRequest,
        ctx: &AppContext<DB>,
    ) -> AppResult<Option<AppResponse>> {
        match (req.method(), req.path()) {
            (HttpMethod::Post, "/actions/quizzes/create") => {
                Ok(Some(run_action(&CreateQuizAction, req, ctx).await?))
            }
            (HttpMethod::Post, "/actions/quizzes/publish") => {
                Ok(Some(run_action(&PublishQuizAction, req, ctx).await?))
            }
            (HttpMethod::Post, "/actions/quizzes/submit") => {
                Ok(Some(run_action(&SubmitQuizAction, req, ctx).await?))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_question_errors_are_reported() {
        let input: CreateQuizInput = serde_json::from_str(
            r#"{
                "courseId": "c1",
                "title": "Cells",
                "questions": [
                    {"prompt": "Powerhouse?", "options": ["Mitochondria", "Nucleus"], "correctOption": 0, "points": 1},
                    {"prompt": "", "options": ["Only one"], "correctOption": 0, "points": 1}
                ]
            }"#,
        )
        .unwrap();

        let errors = input.validate().unwrap_err();
        let fields = classroom_core::field_errors(&errors);
        assert!(fields.keys().any(|k| k.starts_with("questions[1].")));
        assert!(!fields.keys().any(|k| k.starts_with("questions[0].")));
    }

    #[test]
    fn test_empty_quiz_is_rejected() {
        let input: CreateQuizInput =
            serde_json::from_str(r#"{"courseId":"c1","title":"Empty"}"#).unwrap();
        assert!(input.validate().is_err());
    }
}
