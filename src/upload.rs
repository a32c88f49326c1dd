//! Upload registrar
//!
//! Handles the `upload:<path>[,<path>...]` command: each path is uploaded
//! independently and a failure on one path never aborts the rest of the
//! command. Successful references are appended to the session attachment
//! state so every subsequent call carries them as context.

use crate::gemini::AssetStore;
use crate::session::CanvasSession;
use tracing::warn;

/// Outcome of one multi-path upload command
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl UploadReport {
    pub fn any_succeeded(&self) -> bool {
        !self.uploaded.is_empty()
    }
}

/// Split a comma-separated path list, trimming whitespace and dropping
/// empty segments.
pub fn split_paths(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Upload every path in the command, sequentially and independently.
/// Failures are logged and skipped; successes are registered with the
/// session.
pub async fn register_paths(
    store: &dyn AssetStore,
    session: &mut CanvasSession,
    raw_paths: &str,
) -> UploadReport {
    let mut report = UploadReport::default();

    for path in split_paths(raw_paths) {
        match store.upload(path).await {
            Ok(file) => {
                session.register_attachment(file);
                report.uploaded.push(path.to_string());
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Error uploading file from path");
                report.failed.push((path.to_string(), e.to_string()));
            }
        }
    }

    report
}
