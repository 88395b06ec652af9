use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Key used when a filename sanitizes to nothing.
pub const FALLBACK_OBJECT_KEY: &str = "upload";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload of {key} failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

// 1. StorageService Contract
/// StorageService
///
/// Public blob storage for uploaded images. The handlers only see this trait,
/// so tests run against `MockStorageService` instead of a real bucket.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Only called for the local MinIO setup.
    async fn ensure_bucket_exists(&self);

    /// Stores `data` publicly under a key derived from `file_name` and returns
    /// the URL it can be fetched from.
    async fn put_public(
        &self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<String, StorageError>;
}

// 2. The Real Implementation (S3/MinIO/Supabase)
/// S3StorageClient
///
/// `StorageService` over the AWS SDK. Works against any S3-compatible endpoint:
/// MinIO locally, Supabase Storage in production. Path-style addressing is
/// required by both.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    public_base_url: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_base_url: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        let client = s3::Client::from_conf(config);

        Self {
            client,
            bucket_name: bucket.to_string(),
            public_base_url: public_base_url.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// CreateBucket is idempotent; an "already owned" error is ignored.
    async fn ensure_bucket_exists(&self) {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!("create_bucket {}: {}", self.bucket_name, e);
        }
    }

    async fn put_public(
        &self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<String, StorageError> {
        let key = object_key(file_name);

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        Ok(public_url(&self.public_base_url, &key))
    }
}

/// sanitize_key
///
/// Removes directory navigation components (`..`, `.`, empty) from a
/// user-provided key so it cannot escape the bucket prefix.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Object key for an uploaded file: its original name, sanitized.
pub fn object_key(file_name: &str) -> String {
    let key = sanitize_key(file_name);
    if key.is_empty() {
        FALLBACK_OBJECT_KEY.to_string()
    } else {
        key
    }
}

/// Joins the public base URL and a key, percent-encoding each key segment.
pub fn public_url(base_url: &str, key: &str) -> String {
    let encoded = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}", base_url.trim_end_matches('/'), encoded)
}

// 3. The Mock Implementation (For Tests)
/// StoredObject
///
/// One write recorded by `MockStorageService`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub key: String,
    pub content_type: String,
    pub size: usize,
}

/// MockStorageService
///
/// Records every successful write instead of talking to S3. Clones share the
/// same record, so a test can keep one handle and give another to the router.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    uploads: Arc<Mutex<Vec<StoredObject>>>,
}

pub const MOCK_PUBLIC_BASE_URL: &str = "http://localhost:9000/mock-bucket";

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> Vec<StoredObject> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {
        // No-op in mock environment.
    }

    async fn put_public(
        &self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Unavailable(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }

        let key = object_key(file_name);
        self.uploads
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
            .push(StoredObject {
                key: key.clone(),
                content_type: content_type.to_string(),
                size: data.len(),
            });

        Ok(public_url(MOCK_PUBLIC_BASE_URL, &key))
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
