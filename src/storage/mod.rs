//! Supabase-style object store client for listing images. Uploads go
//! through the storage REST API with a service key; deletions are
//! best-effort and never fail the surrounding request.

use base64::Engine;
use chrono::Utc;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};

const BUCKET: &str = "car-images";

#[derive(Clone)]
pub struct ObjectStore {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl ObjectStore {
    /// Build a store client from config, or `None` when the object store
    /// is not configured in this deployment.
    pub fn from_config(client: reqwest::Client, config: &Config) -> Option<Self> {
        let base_url = config.supabase_url.clone()?;
        let service_key = config.supabase_service_key.clone()?;

        Some(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        })
    }

    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, BUCKET, path
        )
    }

    /// Upload one listing image under `cars/{car_id}/` and return its
    /// public URL.
    pub async fn upload_car_image(
        &self,
        car_id: Uuid,
        index: usize,
        extension: &str,
        bytes: Vec<u8>,
    ) -> AppResult<String> {
        let path = format!(
            "cars/{}/image-{}-{}.{}",
            car_id,
            Utc::now().timestamp_millis(),
            index,
            extension
        );
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, BUCKET, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.service_key)
            .header("Content-Type", format!("image/{}", extension))
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Image upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Image upload rejected ({}): {}",
                status, detail
            )));
        }

        Ok(self.public_url(&path))
    }

    /// Delete listing images by public URL. Failures are logged and
    /// swallowed; the listing row is already gone at this point.
    pub async fn remove_images(&self, urls: &[String]) {
        for url in urls {
            let Some(path) = object_path(url) else {
                tracing::warn!(url = %url, "skipping image with unrecognized URL");
                continue;
            };

            let endpoint = format!("{}/storage/v1/object/{}/{}", self.base_url, BUCKET, path);
            match self
                .client
                .delete(&endpoint)
                .bearer_auth(&self.service_key)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    tracing::warn!(url = %url, status = %response.status(), "image deletion failed");
                }
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "image deletion failed");
                }
            }
        }
    }
}

/// Extract the bucket-relative object path from a public URL.
pub fn object_path(url: &str) -> Option<String> {
    let marker = format!("/{}/", BUCKET);
    let start = url.find(&marker)? + marker.len();
    let path = &url[start..];
    if path.is_empty() {
        return None;
    }
    Some(path.to_string())
}

/// Decode a `data:image/...;base64,...` payload into its file extension
/// and raw bytes.
pub fn parse_image_data_url(data_url: &str) -> Option<(String, Vec<u8>)> {
    let rest = data_url.strip_prefix("data:image/")?;
    let (extension, payload) = rest.split_once(";base64,")?;
    if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .ok()?;

    Some((extension.to_string(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_from_public_url() {
        let url = "https://proj.supabase.co/storage/v1/object/public/car-images/cars/abc/image-1-0.jpeg";
        assert_eq!(
            object_path(url).as_deref(),
            Some("cars/abc/image-1-0.jpeg")
        );
    }

    #[test]
    fn test_object_path_rejects_foreign_url() {
        assert!(object_path("https://example.com/some/image.png").is_none());
    }

    #[test]
    fn test_parse_data_url() {
        // "hi" in base64
        let (ext, bytes) = parse_image_data_url("data:image/png;base64,aGk=").unwrap();
        assert_eq!(ext, "png");
        assert_eq!(bytes, b"hi");
    }

    #[test]
    fn test_parse_data_url_rejects_non_image() {
        assert!(parse_image_data_url("data:text/plain;base64,aGk=").is_none());
        assert!(parse_image_data_url("not a data url").is_none());
    }
}
