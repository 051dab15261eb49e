use crate::config::UploadConfig;
use crate::error::ApiError;

/// Boundary checks applied to uploaded files before they reach the registry.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    max_bytes: usize,
    allowed_content_types: Vec<String>,
}

impl UploadPolicy {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            max_bytes: config.max_bytes,
            allowed_content_types: config
                .allowed_content_types
                .iter()
                .map(|value| value.trim().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn check(&self, content_type: &str, size: usize) -> Result<(), ApiError> {
        let normalized = essence(content_type);
        if !self.allowed_content_types.iter().any(|t| *t == normalized) {
            return Err(ApiError::UnsupportedMediaType(content_type.to_string()));
        }

        if size > self.max_bytes {
            return Err(ApiError::PayloadTooLarge {
                limit: self.max_bytes,
            });
        }

        Ok(())
    }
}

/// Media type without parameters, lowercased.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Extension after the last `.` of the client filename, else one implied by the
/// content type.
pub fn file_extension(file_name: Option<&str>, content_type: &str) -> Option<String> {
    let from_name = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.trim())
        .filter(|ext| !ext.is_empty());

    if let Some(ext) = from_name {
        return Some(ext.to_string());
    }

    let ext = match essence(content_type).as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        _ => return None,
    };
    Some(ext.to_string())
}
