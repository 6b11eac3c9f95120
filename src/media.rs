//! Upload storage capability: store bytes, return the public path they are served from.

use crate::error::AppError;
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;

/// Public URL prefix for stored files. Member photos referencing stored files must start with it.
pub const UPLOADS_PREFIX: &str = "/uploads/";

/// Upper bound for one uploaded file.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/mpeg",
];

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist `bytes` and return the path under [`UPLOADS_PREFIX`] they will be served from.
    async fn store(&self, file_name: &str, content_type: &str, bytes: &[u8]) -> Result<String, AppError>;
}

/// Files written to a local directory that is also served statically.
pub struct DiskMediaStore {
    root: PathBuf,
}

impl DiskMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DiskMediaStore { root: root.into() }
    }
}

fn sanitize_file_name(name: &str) -> Result<String, AppError> {
    let re = Regex::new(r"[^A-Za-z0-9._-]").map_err(|e| AppError::Storage(e.to_string()))?;
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned = re.replace_all(base, "_").trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        Ok("upload".to_string())
    } else {
        Ok(cleaned)
    }
}

#[async_trait]
impl MediaStore for DiskMediaStore {
    async fn store(&self, file_name: &str, content_type: &str, bytes: &[u8]) -> Result<String, AppError> {
        if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
            return Err(AppError::Validation(format!("file type not allowed: {}", content_type)));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::Validation(format!(
                "file larger than {} bytes",
                MAX_UPLOAD_BYTES
            )));
        }
        let stored_name = format!(
            "{}-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4().simple(),
            sanitize_file_name(file_name)?
        );
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Storage(format!("create upload dir: {}", e)))?;
        tokio::fs::write(self.root.join(&stored_name), bytes)
            .await
            .map_err(|e| AppError::Storage(format!("write upload: {}", e)))?;
        tracing::info!(file = %stored_name, size = bytes.len(), "upload stored");
        Ok(format!("{}{}", UPLOADS_PREFIX, stored_name))
    }
}
