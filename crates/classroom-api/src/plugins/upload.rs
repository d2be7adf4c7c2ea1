use async_trait::async_trait;
use serde::Deserialize;
use validator::Validate;

use classroom_core::upload::{decode_upload_data, validate_upload};
use classroom_core::{
    AppContext, AppPlugin, AppRequest, AppResponse, AppResult, AppRoute, CreateFile,
    DatabaseAdapter, HttpMethod, UploadedFile,
};

use crate::action::{ActionCaller, ServerAction, run_action};

/// File uploads. Only the validated metadata is recorded.
pub struct UploadPlugin;

impl UploadPlugin {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadFileInput {
    #[validate(length(min = 1, max = 255, message = "File name must be between 1 and 255 characters"))]
    pub file_name: String,
    #[validate(length(min = 1, message = "Content type is required"))]
    pub content_type: String,
    /// Base64 file contents.
    #[validate(length(min = 1, message = "File data is required"))]
    pub data: String,
}

pub struct UploadFileAction;

#[async_trait]
impl<DB: DatabaseAdapter> ServerAction<DB> for UploadFileAction {
    type Input = UploadFileInput;
    type Output = UploadedFile;

    fn name(&self) -> &'static str {
        "upload-file"
    }

    async fn perform(
        &self,
        input: UploadFileInput,
        caller: &ActionCaller,
        ctx: &AppContext<DB>,
    ) -> AppResult<UploadedFile> {
        let user = caller.user()?;
        let bytes = decode_upload_data(&input.data)?;
        validate_upload(
            &input.file_name,
            &input.content_type,
            bytes.len(),
            ctx.config.upload.max_file_bytes,
        )?;

        ctx.database
            .create_file(CreateFile {
                owner_id: user.id.clone(),
                file_name: input.file_name.trim().to_string(),
                content_type: input.content_type,
                size: bytes.len(),
            })
            .await
    }
}

#[async_trait]
impl<DB: DatabaseAdapter> AppPlugin<DB> for UploadPlugin {
    fn name(&self) -> &'static str {
        "upload"
    }

    fn routes(&self) -> Vec<AppRoute> {
        vec![AppRoute::post("/actions/uploads", "upload_file")]
    }

    async fn on_request(
        &self,
        req: &AppRequest,
        ctx: &AppContext<DB>,
    ) -> AppResult<Option<AppResponse>> {
        match (req.method(), req.path()) {
            (HttpMethod::Post, "/actions/uploads") => {
                Ok(Some(run_action(&UploadFileAction, req, ctx).await?))
            }
            _ => Ok(None),
        }
    }
}
