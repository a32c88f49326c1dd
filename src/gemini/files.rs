//! File API upload support.
//!
//! Local files are pushed to the backend asset store and referenced by an
//! opaque URI in later generation calls. Media types are inferred from the
//! file suffix; unrecognized suffixes upload with no explicit override.

use crate::error::CanvasError;
use crate::gemini::GeminiClient;
use crate::models::AttachedFile;
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

/// Infer a media type from the file suffix.
///
/// `.pdf` maps to `application/pdf`; `.png`, `.jpg` and `.jpeg` map to
/// `image/<ext>`. Anything else returns `None` and the upload carries no
/// explicit media type.
pub fn infer_media_type(path: &str) -> Option<String> {
    let ext = path.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf".to_string()),
        "png" | "jpg" | "jpeg" => Some(format!("image/{}", ext)),
        _ => None,
    }
}

/// Seam for the backend asset store, so the upload registrar is testable
/// without a network.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn upload(&self, path: &str) -> Result<AttachedFile>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFileMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFileMeta {
    #[serde(default)]
    name: String,
    uri: String,
    mime_type: Option<String>,
}

#[async_trait]
impl AssetStore for GeminiClient {
    async fn upload(&self, path: &str) -> Result<AttachedFile> {
        self.check_key()?;

        let media_type = infer_media_type(path);
        let bytes = tokio::fs::read(path).await?;

        let url = format!(
            "{}/upload/v1beta/files?key={}",
            self.base_url, self.api_key
        );

        let mut request = self
            .client
            .post(&url)
            .header("X-Goog-Upload-Protocol", "raw")
            .body(bytes);

        if let Some(mime) = &media_type {
            request = request.header(reqwest::header::CONTENT_TYPE, mime.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| CanvasError::UploadError(format!("upload request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CanvasError::UploadError(format!(
                "backend rejected upload of {}: {}",
                path, error_text
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| CanvasError::UploadError(format!("invalid upload response: {}", e)))?;

        info!(path = %path, file = %uploaded.file.name, "File uploaded");

        Ok(AttachedFile {
            uri: uploaded.file.uri,
            media_type: uploaded.file.mime_type.or(media_type),
            local_path: path.to_string(),
        })
    }
}
