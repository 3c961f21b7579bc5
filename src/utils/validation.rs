use std::path::Path;
use thiserror::Error;
use validator::Validate;

/// Stored names longer than this are cut before the uniqueness suffix is added
pub const MAX_NAME_LEN: usize = 150;

/// Longer "extensions" are treated as part of the stem
pub const MAX_EXTENSION_LEN: usize = 16;

#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Validate)]
struct TargetFormat {
    #[validate(length(min = 1, max = 16))]
    token: String,
}

/// Validates a requested target format token such as `PDF` or `tar.gz`.
///
/// The token becomes the output file extension, so only ASCII
/// alphanumerics and inner dots are accepted.
pub fn validate_target_format(raw: &str) -> Result<String, ValidationError> {
    let token = raw.trim();

    if token.is_empty() {
        return Err(ValidationError {
            code: "MISSING_TARGET_FORMAT",
            message: "No target format specified".to_string(),
        });
    }

    TargetFormat {
        token: token.to_string(),
    }
    .validate().map_err(|_| ValidationError {
        code: "INVALID_TARGET_FORMAT",
        message: "Target format must be between 1 and 16 characters".to_string(),
    })?;

    let well_formed = token.chars().all(|c| c.is_ascii_alphanumeric() || c == '.')
        && !token.starts_with('.')
        && !token.ends_with('.')
        && !token.contains("..");

    if !well_formed {
        return Err(ValidationError {
            code: "INVALID_TARGET_FORMAT",
            message: format!("Invalid target format '{}'", token),
        });
    }

    Ok(token.to_string())
}

/// Sanitizes a client-supplied filename for use inside a stored name.
///
/// Path components are dropped, reserved characters become `_`, a leading
/// dot is replaced so staged files are never hidden, and the result is
/// capped at [`MAX_NAME_LEN`] bytes on a char boundary.
pub fn sanitize_filename(filename: &str) -> String {
    // Browsers on Windows may send full paths
    let last_segment = filename.rsplit(['/', '\\']).next().unwrap_or("");
    let name = Path::new(last_segment)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path components stripped from upload name: {}", filename);
    }

    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    if sanitized.starts_with('.') {
        sanitized.replace_range(..1, "_");
    }

    if sanitized.trim().is_empty() {
        return "unnamed".to_string();
    }

    if sanitized.len() <= MAX_NAME_LEN {
        return sanitized;
    }

    // Cut the stem, never the extension
    match split_extension(&sanitized) {
        (stem, Some(ext)) => {
            let stem = truncate_on_char_boundary(stem, MAX_NAME_LEN - ext.len() - 1);
            format!("{}.{}", stem, ext)
        }
        (stem, None) => truncate_on_char_boundary(stem, MAX_NAME_LEN).to_string(),
    }
}

/// Splits `name` at its last dot when what follows is a plausible
/// extension: non-empty, at most [`MAX_EXTENSION_LEN`] bytes, with a
/// non-empty stem before it.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.len() <= MAX_EXTENSION_LEN =>
        {
            (stem, Some(ext))
        }
        _ => (name, None),
    }
}

fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// True when `name` can only address a direct child of the staging directory
pub fn is_safe_stored_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.chars().any(|c| c.is_control())
}
