// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Object storage: the PUT/GET/DELETE surface the orchestrator needs to
//! park a finished run's artifacts, backed by S3.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::core::{IngestError, Result};

/// Object storage operations the orchestrator depends on.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `bytes` to `key`.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Download the object at `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove the object at `key`. Used to clean up a job's scratch copy
    /// after a confirmed upload.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// `ObjectStore` backed by the real AWS S3 SDK.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| IngestError::storage_failure("object-store", e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| IngestError::storage_failure("object-store", e.to_string()))?;
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| IngestError::storage_failure("object-store", e.to_string()))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| IngestError::storage_failure("object-store", e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory stand-in used to exercise orchestrator logic without AWS.
    pub struct InMemoryObjectStore {
        objects: Mutex<std::collections::HashMap<String, Vec<u8>>>,
    }

    impl InMemoryObjectStore {
        pub fn new() -> Self {
            Self {
                objects: Mutex::new(std::collections::HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for InMemoryObjectStore {
        async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
            self.objects.lock().unwrap().insert(key.to_string(), bytes);
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Vec<u8>> {
            self.objects
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| IngestError::storage_failure("object-store", "not found"))
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryObjectStore::new();
        store.put("runs/1.mcap", b"data".to_vec()).await.unwrap();
        assert_eq!(store.get("runs/1.mcap").await.unwrap(), b"data".to_vec());
    }

    #[tokio::test]
    async fn get_missing_key_is_a_storage_failure() {
        let store = InMemoryObjectStore::new();
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, IngestError::StorageFailure { .. }));
    }

    #[tokio::test]
    async fn delete_removes_the_object() {
        let store = InMemoryObjectStore::new();
        store.put("runs/1.mcap", b"data".to_vec()).await.unwrap();
        store.delete("runs/1.mcap").await.unwrap();
        assert!(store.get("runs/1.mcap").await.is_err());
    }
}
