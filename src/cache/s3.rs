//! S3-compatible cache: one `<key>.json` object per entry.

use super::{CacheEntry, CacheStore};
use crate::error::CacheError;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;

pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Build a client from the ambient AWS credentials for `region`.
    ///
    /// A custom `endpoint` (MinIO, R2, ...) switches to path-style addressing.
    pub async fn connect(bucket: &str, region: &str, endpoint: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()));
        if let Some(endpoint) = endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let mut config = aws_sdk_s3::config::Builder::from(&shared);
        if endpoint.is_some() {
            config = config.force_path_style(true);
        }

        log::debug!("Using S3 cache bucket {} in {}", bucket, region);
        Self {
            client: Client::from_conf(config.build()),
            bucket: bucket.to_string(),
        }
    }
}

fn object_key(key: &str) -> String {
    format!("{}.json", key)
}

#[async_trait]
impl CacheStore for S3Store {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_key(key))
            .send()
            .await;

        let output = match response {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|s| s.is_no_such_key()) => return Ok(None),
            Err(e) => return Err(CacheError::Remote(DisplayErrorContext(&e).to_string())),
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| CacheError::Remote(e.to_string()))?
            .into_bytes();

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| CacheError::Corrupt(format!("s3://{}/{}: {}", self.bucket, object_key(key), e)))
    }

    async fn save(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let body = serde_json::to_vec(entry).map_err(|e| CacheError::Corrupt(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_key(&entry.key))
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| CacheError::Remote(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}
