//! Cloud object storage `StorageBackend`, backed by an S3-compatible bucket
//! via `object_store`'s `AmazonS3Builder`.

use async_trait::async_trait;
use clipforge_core::error::DomainError;
use clipforge_core::ports::{DomainResult, StorageBackend};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;

fn transport(err: impl std::error::Error + Send + Sync + 'static) -> DomainError {
    DomainError::Transport(anyhow::Error::new(err))
}

/// Bucket connection parameters, loaded from `CloudStorageConfig::from_env`.
#[derive(Debug, Clone)]
pub struct CloudBucketConfig {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>,
    pub allow_http: bool,
}

pub struct CloudBucketBackend {
    store: Arc<dyn ObjectStore>,
}

impl CloudBucketBackend {
    pub fn new(config: &CloudBucketConfig) -> anyhow::Result<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_region(&config.region)
            .with_bucket_name(&config.bucket_name)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key);

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.with_endpoint(endpoint);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        Ok(Self {
            store: Arc::new(builder.build()?),
        })
    }
}

#[async_trait]
impl StorageBackend for CloudBucketBackend {
    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> DomainResult<()> {
        let object_path = ObjectPath::from(path);
        self.store
            .put(&object_path, bytes.into())
            .await
            .map_err(transport)?;
        Ok(())
    }

    async fn get(&self, path: &str) -> DomainResult<Vec<u8>> {
        let object_path = ObjectPath::from(path);
        let result = self.store.get(&object_path).await.map_err(|e| {
            if matches!(e, object_store::Error::NotFound { .. }) {
                DomainError::NotFound(path.to_string())
            } else {
                transport(e)
            }
        })?;
        let bytes = result.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, path: &str) -> DomainResult<()> {
        let object_path = ObjectPath::from(path);
        match self.store.delete(&object_path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(transport(e)),
        }
    }

    async fn exists(&self, path: &str) -> DomainResult<bool> {
        let object_path = ObjectPath::from(path);
        match self.store.head(&object_path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(transport(e)),
        }
    }
}
