use async_trait::async_trait;
use chrono::Utc;

use classroom_core::reports::{
    progress_report, progress_report_columns, school_report, school_report_columns,
};
use classroom_core::{
    AppContext, AppError, AppPlugin, AppRequest, AppResponse, AppResult, AppRoute,
    DatabaseAdapter, HttpMethod, csv_filename, to_csv_serialized,
};

use super::helpers::{is_tenant_admin, required_query};

/// CSV downloads. Every failure is answered with 403 and a JSON error body.
pub struct ExportPlugin;

impl ExportPlugin {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }

    async fn handle_school_report<DB: DatabaseAdapter>(
        &self,
        req: &AppRequest,
        ctx: &AppContext<DB>,
    ) -> AppResult<AppResponse> {
        let (user, _session) = ctx.require_session(req).await?;
        let tenant_id = required_query(req, "tenantId")?;

        if !is_tenant_admin(ctx, &user, tenant_id).await? {
            return Err(AppError::forbidden("You do not administer this school"));
        }

        let rows = school_report(ctx.database.as_ref(), ctx.identity.as_ref(), tenant_id).await?;
        let body = to_csv_serialized(&rows, &school_report_columns())?;

        tracing::info!(tenant_id, rows = rows.len(), "school report exported");
        Ok(AppResponse::csv(body, &dated_filename("school-report")))
    }

    async fn handle_progress_report<DB: DatabaseAdapter>(
        &self,
        req: &AppRequest,
        ctx: &AppContext<DB>,
    ) -> AppResult<AppResponse> {
        let (user, _session) = ctx.require_session(req).await?;
        let student_id = required_query(req, "studentId")?;

        if ctx.identity.get_user(student_id).await?.is_none() {
            return Err(AppError::not_found("Student not found"));
        }
        if user.id != student_id && !ctx.database.is_parent_of(&user.id, student_id).await? {
            return Err(AppError::forbidden("You are not linked to this student"));
        }

        let rows = progress_report(ctx.database.as_ref(), student_id).await?;
        let body = to_csv_serialized(&rows, &progress_report_columns())?;

        tracing::info!(student_id, rows = rows.len(), "progress report exported");
        Ok(AppResponse::csv(body, &dated_filename("progress-report")))
    }
}

fn dated_filename(stem: &str) -> String {
    csv_filename(&format!("{}-{}", stem, Utc::now().format("%Y-%m-%d")))
}

fn forbidden_on_error(result: AppResult<AppResponse>) -> AppResponse {
    result.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "export rejected");
        err.into_response_with_status(403)
    })
}

#[async_trait]
impl<DB: DatabaseAdapter> AppPlugin<DB> for ExportPlugin {
    fn name(&self) -> &'static str {
        "export"
    }

    fn routes(&self) -> Vec<AppRoute> {
        vec![
            AppRoute::get("/api/export/school-report", "export_school_report"),
            AppRoute::get("/api/export/progress-report", "export_progress_report"),
        ]
    }

    async fn on_request(
        &self,
        req: &AppRequest,
        ctx: &AppContext<DB>,
    ) -> AppResult<Option<AppResponse>> {
        match (req.method(), req.path()) {
            (HttpMethod::Get, "/api/export/school-report") => Ok(Some(forbidden_on_error(
                self.handle_school_report(req, ctx).await,
            ))),
            (HttpMethod::Get, "/api/export/progress-report") => Ok(Some(forbidden_on_error(
                self.handle_progress_report(req, ctx).await,
            ))),
            _ => Ok(None),
        }
    }
}
