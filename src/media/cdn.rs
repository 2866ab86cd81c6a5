use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::time::Duration;

use crate::util::env::{env_opt, env_req};

/// HTTP object-storage client for the image CDN. Files are PUT to the
/// storage endpoint under the configured zone and served from the public
/// pull zone.
///
/// Environment-driven configuration (loaded at process start):
/// - CDN_STORAGE_ENDPOINT (default https://storage.bunnycdn.com)
/// - CDN_STORAGE_ZONE
/// - CDN_API_KEY
/// - CDN_PULL_ZONE (public hostname, e.g. cdn.visitslovenia.com)
#[derive(Debug, Clone)]
pub struct CdnStorage {
    storage_endpoint: String,
    zone: String,
    api_key: String,
    pull_zone: String,
    http: Client,
}

impl CdnStorage {
    pub fn new(
        storage_endpoint: Option<&str>,
        zone: String,
        api_key: String,
        pull_zone: String,
    ) -> Result<Self> {
        let storage_endpoint = storage_endpoint
            .unwrap_or("https://storage.bunnycdn.com")
            .trim_end_matches('/')
            .to_string();
        let http = Client::builder()
            .user_agent("CdnStorage/1.0")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            storage_endpoint,
            zone,
            api_key,
            pull_zone: pull_zone.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_env() -> Result<Self> {
        let zone = env_req("CDN_STORAGE_ZONE")?;
        let api_key = env_req("CDN_API_KEY")?;
        let pull_zone = env_req("CDN_PULL_ZONE")?;
        let endpoint = env_opt("CDN_STORAGE_ENDPOINT");
        Self::new(endpoint.as_deref(), zone, api_key, pull_zone)
    }

    /// Public GET URL for an object path.
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.pull_zone, path.trim_start_matches('/'))
    }

    /// Upload raw bytes to the zone. Returns the public URL.
    pub async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let path = path.trim_start_matches('/');
        let url = format!("{}/{}/{}", self.storage_endpoint, self.zone, path);

        let resp = self
            .http
            .put(&url)
            .header("AccessKey", &self.api_key)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("CDN upload failed: {status} path={path} body={body}"));
        }

        Ok(self.public_url(path))
    }

    /// Download a source image and re-upload it under the given path.
    /// Returns the public URL of the stored copy.
    pub async fn fetch_and_upload(&self, source_url: &str, path: &str) -> Result<String> {
        let resp = self
            .http
            .get(source_url)
            .send()
            .await
            .with_context(|| format!("image download failed: {source_url}"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("image download failed: {status} url={source_url}"));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = resp.bytes().await?.to_vec();
        self.upload(path, bytes, &content_type).await
    }
}

/// Derive an object path for an imported tour image: one folder per product
/// code, extension carried over from the source URL when recognizable.
pub fn object_path(product_code: &str, index: usize, source_url: &str) -> String {
    let ext = source_url
        .rsplit('.')
        .next()
        .filter(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png" | "webp"))
        .unwrap_or("jpg");
    format!("tours/{product_code}/{index}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_keeps_known_extensions() {
        assert_eq!(
            object_path("7365P4", 0, "https://img.example.com/a/b/photo.webp"),
            "tours/7365P4/0.webp"
        );
        assert_eq!(
            object_path("7365P4", 2, "https://img.example.com/a/b/photo?size=large"),
            "tours/7365P4/2.jpg"
        );
    }

    #[test]
    fn public_url_joins_pull_zone() {
        let cdn = CdnStorage::new(
            None,
            "visitslovenia".into(),
            "key".into(),
            "https://cdn.visitslovenia.com".into(),
        )
        .unwrap();
        assert_eq!(
            cdn.public_url("/tours/7365P4/0.jpg"),
            "https://cdn.visitslovenia.com/tours/7365P4/0.jpg"
        );
    }
}
