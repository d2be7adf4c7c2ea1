//! Uploaded file validation.
//!
//! Uploads arrive as JSON with the file bytes base64-encoded in `data`.
//! Validation is a single stateless pass over name, extension, declared
//! content type and decoded size.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::error::AppError;

/// Accepted extensions and the content types each may be declared as.
const ALLOWED_TYPES: &[(&str, &[&str])] = &[
    ("pdf", &["application/pdf"]),
    ("doc", &["application/msword"]),
    (
        "docx",
        &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
    ),
    ("txt", &["text/plain"]),
    ("png", &["image/png"]),
    ("jpg", &["image/jpeg"]),
    ("jpeg", &["image/jpeg"]),
    ("gif", &["image/gif"]),
    ("ppt", &["application/vnd.ms-powerpoint"]),
    (
        "pptx",
        &["application/vnd.openxmlformats-officedocument.presentationml.presentation"],
    ),
    ("xls", &["application/vnd.ms-excel"]),
    (
        "xlsx",
        &["application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"],
    ),
    ("csv", &["text/csv", "text/plain", "application/vnd.ms-excel"]),
    ("zip", &["application/zip", "application/x-zip-compressed"]),
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UploadError {
    #[error("File name is required")]
    MissingName,

    #[error("File name must not contain path separators")]
    InvalidName,

    #[error("File type .{0} is not allowed")]
    UnsupportedExtension(String),

    #[error("Content type {content_type} does not match .{extension} files")]
    ContentTypeMismatch {
        extension: String,
        content_type: String,
    },

    #[error("File data is not valid base64")]
    InvalidEncoding,

    #[error("File is empty")]
    Empty,

    #[error("File exceeds the maximum size of {max} bytes")]
    TooLarge { max: usize },
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::TooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            other => AppError::Validation(other.to_string()),
        }
    }
}

/// Extensions accepted for upload.
pub fn allowed_extensions() -> impl Iterator<Item = &'static str> {
    ALLOWED_TYPES.iter().map(|(ext, _)| *ext)
}

/// Decode the base64 `data` field. A `data:<type>;base64,` prefix is
/// tolerated.
pub fn decode_upload_data(data: &str) -> Result<Vec<u8>, UploadError> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|_| UploadError::InvalidEncoding)
}

/// Validate an upload and return its lower-cased extension.
pub fn validate_upload(
    file_name: &str,
    content_type: &str,
    size: usize,
    max_bytes: usize,
) -> Result<String, UploadError> {
    let name = file_name.trim();
    if name.is_empty() {
        return Err(UploadError::MissingName);
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(UploadError::InvalidName);
    }

    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let Some((_, content_types)) = ALLOWED_TYPES.iter().find(|(ext, _)| *ext == extension) else {
        return Err(UploadError::UnsupportedExtension(extension));
    };

    let declared = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if !content_types.contains(&declared.as_str()) {
        return Err(UploadError::ContentTypeMismatch {
            extension,
            content_type: declared,
        });
    }

    if size == 0 {
        return Err(UploadError::Empty);
    }
    if size > max_bytes {
        return Err(UploadError::TooLarge { max: max_bytes });
    }

    Ok(extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 10 * 1024 * 1024;

    #[test]
    fn test_accepts_known_types() {
        assert_eq!(
            validate_upload("essay.PDF", "application/pdf", 10, MAX).unwrap(),
            "pdf"
        );
        assert_eq!(
            validate_upload("grades.csv", "text/csv; charset=utf-8", 10, MAX).unwrap(),
            "csv"
        );
        assert_eq!(allowed_extensions().count(), 14);
    }

    #[test]
    fn test_rejects_unknown_extension() {
        assert_eq!(
            validate_upload("run.exe", "application/octet-stream", 10, MAX),
            Err(UploadError::UnsupportedExtension("exe".to_string()))
        );
        assert_eq!(
            validate_upload("README", "text/plain", 10, MAX),
            Err(UploadError::UnsupportedExtension(String::new()))
        );
    }

    #[test]
    fn test_rejects_mismatched_content_type() {
        let err = validate_upload("photo.png", "application/pdf", 10, MAX).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Content type application/pdf does not match .png files"
        );
    }

    #[test]
    fn test_rejects_paths_and_blank_names() {
        assert_eq!(
            validate_upload("../etc/passwd.txt", "text/plain", 10, MAX),
            Err(UploadError::InvalidName)
        );
        assert_eq!(
            validate_upload("  ", "text/plain", 10, MAX),
            Err(UploadError::MissingName)
        );
    }

    #[test]
    fn test_size_bounds() {
        assert_eq!(
            validate_upload("a.txt", "text/plain", 0, MAX),
            Err(UploadError::Empty)
        );
        assert!(validate_upload("a.txt", "text/plain", MAX, MAX).is_ok());

        let err = validate_upload("a.txt", "text/plain", MAX + 1, MAX).unwrap_err();
        assert_eq!(AppError::from(err).status_code(), 413);
    }

    #[test]
    fn test_decode_accepts_data_url() {
        assert_eq!(decode_upload_data("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_upload_data("data:text/plain;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
        assert_eq!(
            decode_upload_data("***"),
            Err(UploadError::InvalidEncoding)
        );
    }
}
