//! Local validation run before any network call.

use std::path::Path;

use crate::config::UploadOptions;
use crate::error::UploadError;

/// Fallback MIME type when the extension is unknown.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Trim the case identifier and reject it when empty.
pub fn validate_case_id(case_id: &str) -> Result<String, UploadError> {
    let trimmed = case_id.trim();
    if trimmed.is_empty() {
        return Err(UploadError::MissingCaseId);
    }
    Ok(trimmed.to_string())
}

/// Normalize the quality selection and check it against the configured values.
pub fn validate_quality(quality: &str, options: &UploadOptions) -> Result<String, UploadError> {
    let normalized = quality.trim().to_lowercase();
    if !options.allows_quality(&normalized) {
        return Err(UploadError::InvalidQuality {
            value: quality.to_string(),
            allowed: options.quality_values.join(", "),
        });
    }
    Ok(normalized)
}

/// MIME type for a filename, based on its extension.
pub fn content_type_for_filename(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        // Videos
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "m4v" => "video/x-m4v",
        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        // Documents
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "srt" => "application/x-subrip",
        "vtt" => "text/vtt",
        // Images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => {
            tracing::debug!(
                extension = %extension,
                "Unknown extension, falling back to octet-stream"
            );
            DEFAULT_CONTENT_TYPE
        }
    }
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
