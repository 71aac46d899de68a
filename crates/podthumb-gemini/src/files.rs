//! Files API: resumable upload and readiness polling.

use std::path::Path;

use serde_json::json;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::client::GeminiClient;
use crate::error::{GeminiError, GeminiResult};
use crate::types::{FileResource, FileState, UploadResponse};

impl GeminiClient {
    /// Upload a local file with the two-step resumable protocol.
    pub async fn upload_file(&self, path: &Path, mime_type: &str) -> GeminiResult<FileResource> {
        let bytes = fs::read(path).await?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        info!(
            file = %path.display(),
            bytes = bytes.len(),
            "Uploading file to Gemini Files API"
        );

        let start_url = format!("{}/upload/v1beta/files", self.config.base_url);
        let start = self
            .http
            .post(&start_url)
            .header("x-goog-api-key", &self.config.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;

        if !start.status().is_success() {
            let status = start.status();
            let body = start.text().await.unwrap_or_default();
            return Err(GeminiError::from_http_status(status, body));
        }

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| GeminiError::Upload("start response carried no upload url".to_string()))?;

        let finish = self
            .http
            .post(&upload_url)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header("X-Goog-Upload-Offset", "0")
            .body(bytes)
            .send()
            .await?;

        if !finish.status().is_success() {
            let status = finish.status();
            let body = finish.text().await.unwrap_or_default();
            return Err(GeminiError::from_http_status(status, body));
        }

        let uploaded: UploadResponse = finish.json().await?;
        debug!(name = %uploaded.file.name, state = uploaded.file.state.as_str(), "Upload finished");
        Ok(uploaded.file)
    }

    /// `GET v1beta/{name}`.
    pub async fn get_file(&self, name: &str) -> GeminiResult<FileResource> {
        let url = format!("{}/v1beta/{}", self.config.base_url, name);
        let response = self
            .http
            .get(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::from_http_status(status, body));
        }

        Ok(response.json().await?)
    }

    /// Poll until the file is `ACTIVE`. `FAILED`, or exhausting the poll
    /// budget, is a configuration error.
    pub async fn wait_until_active(&self, file: FileResource) -> GeminiResult<FileResource> {
        let mut current = file;

        for attempt in 0..self.config.poll_attempts {
            match current.state {
                FileState::Active => return Ok(current),
                FileState::Failed => {
                    return Err(GeminiError::FileFailed {
                        name: current.name,
                    })
                }
                state => {
                    debug!(
                        name = %current.name,
                        state = state.as_str(),
                        attempt = attempt + 1,
                        "Waiting for file to become ACTIVE"
                    );
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
            current = self.get_file(&current.name).await?;
        }

        if current.state == FileState::Active {
            return Ok(current);
        }

        let waited_secs =
            (self.config.poll_interval * self.config.poll_attempts).as_secs();
        warn!(
            name = %current.name,
            state = current.state.as_str(),
            waited_secs,
            "File never became ACTIVE"
        );
        Err(GeminiError::FileNotReady {
            name: current.name,
            state: current.state.as_str().to_string(),
            waited_secs,
        })
    }
}
