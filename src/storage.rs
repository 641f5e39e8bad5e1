use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::config::Config;
use crate::utils::http::get_http_client;

/// Bucket handle for asset archiving, constructed once at startup. Uploads
/// go through the GCS JSON upload API; the analysis flow itself never waits
/// on this client.
#[derive(Debug, Clone)]
pub struct StorageClient {
    bucket: String,
    access_token: String,
    archive_uploads: bool,
}

impl StorageClient {
    pub fn new(
        bucket: impl Into<String>,
        access_token: impl Into<String>,
        archive_uploads: bool,
    ) -> Self {
        StorageClient {
            bucket: bucket.into(),
            access_token: access_token.into(),
            archive_uploads,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        StorageClient::new(
            config.gcs_bucket_name.clone(),
            config.gcs_access_token.clone(),
            config.archive_uploads,
        )
    }

    pub fn archive_enabled(&self) -> bool {
        self.archive_uploads && !self.bucket.trim().is_empty()
    }

    pub async fn archive_image(&self, bytes: &[u8], mime_type: &str) -> Result<String> {
        let object = object_name(mime_type);
        let url = format!(
            "https://storage.googleapis.com/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.bucket, object
        );

        let client = get_http_client();
        let mut request = client
            .post(&url)
            .header(CONTENT_TYPE, mime_type)
            .body(bytes.to_vec());
        if !self.access_token.trim().is_empty() {
            request = request.bearer_auth(self.access_token.trim());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "GCS upload failed with status {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            ));
        }

        let uri = format!("gs://{}/{}", self.bucket, object);
        debug!("Uploaded {} bytes to {}", bytes.len(), uri);
        Ok(uri)
    }
}

fn object_name(mime_type: &str) -> String {
    let extension = match mime_type.split('/').nth(1).unwrap_or("jpeg") {
        "jpeg" => "jpg",
        other => other,
    };
    format!(
        "uploads/{}.{}",
        Utc::now().format("%Y%m%dT%H%M%S%.6f"),
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_is_off_without_bucket_or_flag() {
        assert!(!StorageClient::new("", "", true).archive_enabled());
        assert!(!StorageClient::new("assets", "", false).archive_enabled());
        assert!(StorageClient::new("assets", "", true).archive_enabled());
    }

    #[test]
    fn object_names_map_jpeg_to_jpg_extension() {
        assert!(object_name("image/jpeg").ends_with(".jpg"));
        assert!(object_name("image/png").ends_with(".png"));
        assert!(object_name("image/jpeg").starts_with("uploads/"));
    }
}
