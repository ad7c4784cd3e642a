//! S3-compatible object storage for FAQ video uploads.

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, meta::region::RegionProviderChain};
use aws_sdk_s3::{Client as S3Client, primitives::ByteStream};

use crate::config::StorageConfig;

#[derive(Clone)]
pub struct ObjectStorage {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl ObjectStorage {
    pub async fn connect(config: &StorageConfig) -> Self {
        let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&aws_config);
        // Custom S3-compatible endpoints (e.g. MinIO) need path-style keys
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }

    /// Uploads the object and returns its public URL.
    pub async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("Failed to upload object {key}"))?;

        Ok(self.public_url(key))
    }

    pub fn public_url(&self, key: &str) -> String {
        build_public_url(&self.public_base_url, &self.bucket, key)
    }
}

/// Builds a public URL from a configurable base. The base may template
/// `{bucket}`/`{key}`, already include the bucket, or be a bare host.
pub fn build_public_url(base: &str, bucket: &str, key: &str) -> String {
    let trimmed = base.trim_end_matches('/');

    if trimmed.contains("{bucket}") || trimmed.contains("{key}") {
        return trimmed.replace("{bucket}", bucket).replace("{key}", key);
    }

    if trimmed.contains(bucket) {
        format!("{}/{}", trimmed, key)
    } else {
        format!("{}/{}/{}", trimmed, bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_containing_bucket_appends_key_only() {
        assert_eq!(
            build_public_url("https://videos.s3.amazonaws.com/", "videos", "videos/a.mp4"),
            "https://videos.s3.amazonaws.com/videos/a.mp4"
        );
    }

    #[test]
    fn bare_host_gets_bucket_and_key() {
        assert_eq!(
            build_public_url("https://cdn.example.com", "videos", "k.mp4"),
            "https://cdn.example.com/videos/k.mp4"
        );
    }

    #[test]
    fn templated_base_is_substituted() {
        assert_eq!(
            build_public_url("https://{bucket}.example.com/{key}", "videos", "k.mp4"),
            "https://videos.example.com/k.mp4"
        );
    }
}
