//! Image uploader with per-file results.

use std::sync::{Arc, Mutex};

use bazaar_commerce::CommerceError;
use bazaar_data::upload::{upload_images, ImageFile, UploadResult};
use bazaar_data::FetchClient;
use tracing::{info, warn};

use crate::api::lock;
use crate::Result;

pub const DEFAULT_ENDPOINT: &str = "/upload";

#[derive(Debug, Clone, PartialEq)]
pub struct UploaderState {
    pub endpoint: String,
    pub is_uploading: bool,
    pub results: Vec<UploadResult>,
    /// URL of the last single upload, empty if it failed.
    pub image_url: String,
}

impl Default for UploaderState {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            is_uploading: false,
            results: Vec::new(),
            image_url: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploaderStore {
    client: FetchClient,
    state: Arc<Mutex<UploaderState>>,
}

impl UploaderStore {
    pub fn new(client: FetchClient) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(UploaderState::default())),
        }
    }

    pub fn state(&self) -> UploaderState {
        lock(&self.state).clone()
    }

    pub fn set_endpoint(&self, endpoint: impl Into<String>) {
        lock(&self.state).endpoint = endpoint.into();
    }

    pub fn is_uploading(&self) -> bool {
        lock(&self.state).is_uploading
    }

    pub fn results(&self) -> Vec<UploadResult> {
        lock(&self.state).results.clone()
    }

    pub fn image_url(&self) -> String {
        lock(&self.state).image_url.clone()
    }

    pub fn has_successful(&self) -> bool {
        lock(&self.state).results.iter().any(UploadResult::is_success)
    }

    pub fn has_failed(&self) -> bool {
        lock(&self.state).results.iter().any(|r| !r.is_success())
    }

    pub fn clear_results(&self) {
        lock(&self.state).results.clear();
    }

    /// Upload one image. Failures come back as a failed result, not an error.
    pub async fn upload_one(&self, file: ImageFile) -> UploadResult {
        let filename = file.filename.clone();
        let result = self
            .send(vec![file])
            .await
            .into_iter()
            .next()
            .unwrap_or(UploadResult {
                filename,
                url: None,
                error: Some("Upload failed".to_string()),
            });
        let mut state = lock(&self.state);
        state.image_url = result.url.clone().unwrap_or_default();
        state.results = vec![result.clone()];
        result
    }

    /// Upload several images in one request.
    ///
    /// Every file gets a result; a failed request fails them all with the
    /// same message.
    pub async fn upload_many(&self, files: Vec<ImageFile>) -> Result<Vec<UploadResult>> {
        if files.is_empty() {
            return Err(CommerceError::Validation("No images provided".into()).into());
        }
        let results = self.send(files).await;
        lock(&self.state).results = results.clone();
        Ok(results)
    }

    async fn send(&self, files: Vec<ImageFile>) -> Vec<UploadResult> {
        let endpoint = {
            let mut state = lock(&self.state);
            state.is_uploading = true;
            state.results.clear();
            state.endpoint.clone()
        };
        let names: Vec<String> = files.iter().map(|f| f.filename.clone()).collect();

        let results = match upload_images(&self.client, &endpoint, files, &[]).await {
            Ok(results) => {
                let uploaded = results.iter().filter(|r| r.is_success()).count();
                info!(uploaded, total = results.len(), "images uploaded");
                results
            }
            Err(e) => {
                warn!(%endpoint, error = %e, "image upload failed");
                let message = e.user_message();
                names
                    .into_iter()
                    .map(|filename| UploadResult {
                        filename,
                        url: None,
                        error: Some(message.clone()),
                    })
                    .collect()
            }
        };
        lock(&self.state).is_uploading = false;
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_data::mock::MockBackend;
    use bazaar_data::{FetchPolicy, Method};
    use serde_json::json;
    use std::time::Duration;

    fn store_with(mock: &MockBackend) -> UploaderStore {
        let client = FetchClient::new(Arc::new(mock.clone()))
            .with_policy(FetchPolicy::single_attempt(Duration::from_secs(30)));
        UploaderStore::new(client)
    }

    fn png(name: &str) -> ImageFile {
        ImageFile::new(name, "image/png", vec![1, 2, 3])
    }

    #[tokio::test]
    async fn test_upload_one() {
        let mock = MockBackend::new();
        mock.on(Method::Post, "/upload", 200, json!({"images": [{"url": "https://cdn/a.png"}]}));
        let store = store_with(&mock);

        let result = store.upload_one(png("a.png")).await;
        assert!(result.is_success());
        assert_eq!(store.image_url(), "https://cdn/a.png");
        assert!(store.has_successful());
        assert!(!store.has_failed());
        assert!(!store.is_uploading());
    }

    #[tokio::test]
    async fn test_non_json_body_is_a_failed_result() {
        let mock = MockBackend::new();
        mock.on_raw(Method::Post, "/media", 502, "<html>Bad Gateway</html>");
        let store = store_with(&mock);
        store.set_endpoint("/media");

        let result = store.upload_one(png("a.png")).await;
        assert_eq!(
            result.error.as_deref(),
            Some("Invalid server response: not valid JSON")
        );
        assert_eq!(store.image_url(), "");
        assert!(store.has_failed());

        store.clear_results();
        assert!(!store.has_failed());
    }

    #[tokio::test]
    async fn test_upload_many() {
        let mock = MockBackend::new();
        mock.on(
            Method::Post,
            "/upload",
            200,
            json!({"images": [{"url": "https://cdn/1"}, {"secure_url": "https://cdn/2"}]}),
        );
        let store = store_with(&mock);

        let results = store
            .upload_many(vec![png("1.png"), png("2.png"), png("3.png")])
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[1].url.as_deref(), Some("https://cdn/2"));
        assert!(!results[2].is_success());
        assert_eq!(mock.calls_to(Method::Post, "/upload")[0].parts.len(), 3);

        assert!(store.upload_many(Vec::new()).await.unwrap_err().is_local());
    }
}
