//! Image uploads and upload-response handling.
//!
//! The upload endpoint answers in one of two shapes: a single URL under one
//! of several keys, or an `images` array of objects carrying the URL.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use tracing::debug;

use crate::{FetchClient, FetchError, Part};

const URL_KEYS: [&str; 5] = ["secureUrl", "secure_url", "url", "imageUrl", "imageURL"];

/// Multipart field name for image files.
pub const IMAGE_FIELD: &str = "images";

/// An image to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(filename: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Build from an inline `data:image/...;base64,` URL.
    pub fn from_data_url(data_url: &str, stem: &str) -> Result<Self, FetchError> {
        let decoded = decode_data_url(data_url)?;
        let ext = decoded.mime.rsplit('/').next().unwrap_or("png").to_string();
        Ok(Self {
            filename: format!("{stem}.{ext}"),
            mime: decoded.mime,
            bytes: decoded.bytes,
        })
    }

    fn into_part(self) -> Part {
        Part::File {
            name: IMAGE_FIELD.to_string(),
            filename: self.filename,
            mime: self.mime,
            bytes: self.bytes,
        }
    }
}

/// Outcome for one uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub filename: String,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        self.url.is_some()
    }
}

/// Decoded inline image.
#[derive(Debug, Clone, PartialEq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// True for `data:image/<subtype>;base64,...`.
pub fn is_data_url(value: &str) -> bool {
    split_data_url(value).is_some()
}

fn split_data_url(value: &str) -> Option<(&str, &str)> {
    let rest = value.strip_prefix("data:image/")?;
    let (subtype, payload) = rest.split_once(";base64,")?;
    if subtype.is_empty() || !subtype.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((subtype, payload))
}

pub fn decode_data_url(value: &str) -> Result<DataUrl, FetchError> {
    let (subtype, payload) = split_data_url(value)
        .ok_or_else(|| FetchError::Upload("Not an inline image".to_string()))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| FetchError::Upload(format!("Invalid image data: {e}")))?;
    Ok(DataUrl {
        mime: format!("image/{subtype}"),
        bytes,
    })
}

fn url_in(value: &Value) -> Option<String> {
    URL_KEYS.iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

/// First URL in an upload response, in either shape.
pub fn extract_uploaded_url(body: &Value) -> Option<String> {
    url_in(body).or_else(|| {
        body.get("images")
            .and_then(Value::as_array)
            .and_then(|images| images.first())
            .and_then(url_in)
    })
}

/// Every URL in an upload response, in order.
pub fn extract_uploaded_urls(body: &Value) -> Vec<String> {
    match body.get("images").and_then(Value::as_array) {
        Some(images) => images.iter().filter_map(url_in).collect(),
        None => url_in(body).into_iter().collect(),
    }
}

/// `POST` files as multipart field `images` plus extra text fields.
///
/// Returns one result per file; a response with fewer URLs than files marks
/// the remainder as failed.
pub async fn upload_images(
    client: &FetchClient,
    path: &str,
    files: Vec<ImageFile>,
    fields: &[(&str, &str)],
) -> Result<Vec<UploadResult>, FetchError> {
    if files.is_empty() {
        return Ok(Vec::new());
    }
    let names: Vec<String> = files.iter().map(|f| f.filename.clone()).collect();
    let mut parts: Vec<Part> = files.into_iter().map(ImageFile::into_part).collect();
    parts.extend(fields.iter().map(|(name, value)| Part::Text {
        name: (*name).to_string(),
        value: (*value).to_string(),
    }));

    let response = client.post(path).multipart(parts).send().await?;
    let body: Value = serde_json::from_slice(&response.body)
        .map_err(|_| FetchError::Upload("Invalid server response: not valid JSON".to_string()))?;

    if !response.is_success() {
        let message = body
            .get("error")
            .or_else(|| body.get("message"))
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| format!("HTTP {}", response.status));
        return Err(FetchError::Http {
            status: response.status,
            message,
        });
    }

    let urls = extract_uploaded_urls(&body);
    if urls.is_empty() {
        return Err(FetchError::Upload(
            "Upload successful but no URL returned".to_string(),
        ));
    }
    debug!(files = names.len(), urls = urls.len(), "images uploaded");

    let mut urls = urls.into_iter();
    Ok(names
        .into_iter()
        .map(|filename| match urls.next() {
            Some(url) => UploadResult {
                filename,
                url: Some(url),
                error: None,
            },
            None => UploadResult {
                filename,
                url: None,
                error: Some("No URL returned for this file".to_string()),
            },
        })
        .collect())
}

/// Upload a single image and return its URL.
pub async fn upload_image(
    client: &FetchClient,
    path: &str,
    file: ImageFile,
    fields: &[(&str, &str)],
) -> Result<String, FetchError> {
    upload_images(client, path, vec![file], fields)
        .await?
        .into_iter()
        .find_map(|r| r.url)
        .ok_or_else(|| FetchError::Upload("Upload successful but no URL returned".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use crate::Method;
    use serde_json::json;
    use std::sync::Arc;

    const PNG: &str = "data:image/png;base64,aGVsbG8=";

    #[test]
    fn test_data_url_detection() {
        assert!(is_data_url(PNG));
        assert!(is_data_url("data:image/jpeg;base64,AAAA"));
        assert!(!is_data_url("https://cdn.test/a.png"));
        assert!(!is_data_url("data:text/plain;base64,AAAA"));
        assert!(!is_data_url("data:image/svg+xml;base64,AAAA"));
    }

    #[test]
    fn test_decode_data_url() {
        let decoded = decode_data_url(PNG).unwrap();
        assert_eq!(decoded.mime, "image/png");
        assert_eq!(decoded.bytes, b"hello");
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());

        let file = ImageFile::from_data_url(PNG, "option").unwrap();
        assert_eq!(file.filename, "option.png");
    }

    #[test]
    fn test_extract_both_shapes() {
        assert_eq!(
            extract_uploaded_url(&json!({"secure_url": "https://a"})),
            Some("https://a".into())
        );
        assert_eq!(
            extract_uploaded_url(&json!({"imageURL": "https://b"})),
            Some("https://b".into())
        );
        assert_eq!(
            extract_uploaded_url(&json!({"images": [{"secureUrl": "https://c"}, {"url": "https://d"}]})),
            Some("https://c".into())
        );
        assert_eq!(
            extract_uploaded_urls(&json!({"images": [{"url": "https://c"}, {"url": "https://d"}]})),
            vec!["https://c".to_string(), "https://d".to_string()]
        );
        assert_eq!(extract_uploaded_url(&json!({"ok": true})), None);
    }

    #[tokio::test]
    async fn test_upload_sends_images_field() {
        let mock = MockBackend::new();
        mock.on(Method::Post, "/upload", 200, json!({"url": "https://cdn/x.png"}));
        let client = FetchClient::new(Arc::new(mock.clone()));

        let file = ImageFile::from_data_url(PNG, "x").unwrap();
        let url = upload_image(&client, "/upload", file, &[("productId", "p1")])
            .await
            .unwrap();
        assert_eq!(url, "https://cdn/x.png");

        let calls = mock.calls_to(Method::Post, "/upload");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].parts, vec!["images".to_string(), "productId".to_string()]);
    }

    #[tokio::test]
    async fn test_upload_without_url_is_an_error() {
        let mock = MockBackend::new();
        mock.on(Method::Post, "/upload", 200, json!({"ok": true}));
        let client = FetchClient::new(Arc::new(mock));
        let file = ImageFile::new("a.png", "image/png", vec![1]);
        let err = upload_image(&client, "/upload", file, &[]).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::Upload("Upload successful but no URL returned".into())
        );
    }

    #[tokio::test]
    async fn test_upload_error_body() {
        let mock = MockBackend::new();
        mock.on(Method::Post, "/upload", 413, json!({"error": "File too large"}));
        let client = FetchClient::new(Arc::new(mock));
        let file = ImageFile::new("a.png", "image/png", vec![1]);
        let err = upload_image(&client, "/upload", file, &[]).await.unwrap_err();
        assert_eq!(err.user_message(), "File too large");
    }

    #[tokio::test]
    async fn test_upload_partial_results() {
        let mock = MockBackend::new();
        mock.on(Method::Post, "/upload", 200, json!({"images": [{"url": "https://1"}]}));
        let client = FetchClient::new(Arc::new(mock));
        let files = vec![
            ImageFile::new("a.png", "image/png", vec![1]),
            ImageFile::new("b.png", "image/png", vec![2]),
        ];
        let results = upload_images(&client, "/upload", files, &[]).await.unwrap();
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
    }
}
