use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};

use super::error::StorageError;
use super::traits::{ObjectStore, SignedUrl};
use super::validate_key;
use crate::config::S3Config;

/// S3-compatible object store (AWS, MinIO, R2, ...).
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
    public_base_url: Option<String>,
}

impl S3ObjectStore {
    pub fn new(config: &S3Config) -> Result<Self, StorageError> {
        if config.bucket.trim().is_empty() {
            return Err(StorageError::Config("storage.s3.bucket is required".into()));
        }

        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse()
                .map_err(|e| StorageError::Config(format!("invalid S3 region: {e}")))?,
        };

        let credentials = Credentials::new(
            config.access_key.as_deref(),
            config.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Config(format!("invalid S3 credentials: {e}")))?;

        let mut bucket =
            Bucket::new(&config.bucket, region, credentials).map_err(backend_error)?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self {
            bucket,
            public_base_url: config
                .public_base_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
        })
    }
}

fn backend_error(err: S3Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let response = self
            .bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(backend_error)?;
        if !is_success(response.status_code()) {
            return Err(StorageError::Backend(format!(
                "PUT {key} returned status {}",
                response.status_code()
            )));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        match self.bucket.get_object(key).await {
            Ok(response) if response.status_code() == 404 => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Ok(response) if is_success(response.status_code()) => Ok(response.bytes().to_vec()),
            Ok(response) => Err(StorageError::Backend(format!(
                "GET {key} returned status {}",
                response.status_code()
            ))),
            Err(S3Error::HttpFailWithBody(404, _)) => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        if !self.exists(key).await? {
            return Ok(false);
        }
        let response = self.bucket.delete_object(key).await.map_err(backend_error)?;
        Ok(is_success(response.status_code()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        match self.bucket.head_object(key).await {
            Ok((_, status)) if is_success(status) => Ok(true),
            Ok((_, 404)) | Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Ok((_, status)) => Err(StorageError::Backend(format!(
                "HEAD {key} returned status {status}"
            ))),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<SignedUrl, StorageError> {
        validate_key(key)?;
        let secs = u32::try_from(ttl.as_secs())
            .map_err(|_| StorageError::Config("signed URL TTL out of range".into()))?;
        let url = self
            .bucket
            .presign_get(key, secs, None)
            .await
            .map_err(backend_error)?;
        Ok(SignedUrl {
            url,
            expires_at: Utc::now() + chrono::Duration::seconds(i64::from(secs)),
        })
    }

    fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{base}/{key}"),
            None => format!("{}/{}", self.bucket.url(), key),
        }
    }
}
