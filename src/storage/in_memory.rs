//! In-memory implementation of Storage for testing and development

use crate::core::error::StorageError;
use crate::core::resource::Resource;
use crate::core::storage::Storage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-memory resource storage
///
/// Used by every [`Api`](crate::api::Api) until another backend is set. Uses
/// a single RwLock for thread-safe access; each call takes the lock once.
#[derive(Clone)]
pub struct MapStorage<T> {
    resources: Arc<RwLock<HashMap<String, T>>>,
}

impl<T> MapStorage<T> {
    /// Create a new, empty in-memory storage
    pub fn new() -> Self {
        Self {
            resources: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored resources
    pub fn len(&self) -> Result<usize, StorageError> {
        let resources = self
            .resources
            .read()
            .map_err(|e| StorageError::Internal(format!("Failed to acquire read lock: {}", e)))?;
        Ok(resources.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl<T> Default for MapStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Resource> Storage<T> for MapStorage<T> {
    async fn get(&self, id: &str) -> Result<T, StorageError> {
        let resources = self
            .resources
            .read()
            .map_err(|e| StorageError::Internal(format!("Failed to acquire read lock: {}", e)))?;

        resources.get(id).cloned().ok_or(StorageError::NotFound)
    }

    async fn set(&self, resource: T) -> Result<(), StorageError> {
        let mut resources = self
            .resources
            .write()
            .map_err(|e| StorageError::Internal(format!("Failed to acquire write lock: {}", e)))?;

        resources.insert(resource.id().to_string(), resource);

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let mut resources = self
            .resources
            .write()
            .map_err(|e| StorageError::Internal(format!("Failed to acquire write lock: {}", e)))?;

        resources.remove(id).map(|_| ()).ok_or(StorageError::NotFound)
    }

    async fn get_all(
        &self,
        filter: &(dyn for<'a> Fn(&'a T) -> bool + Send + Sync),
    ) -> Result<Vec<T>, StorageError> {
        let resources = self
            .resources
            .read()
            .map_err(|e| StorageError::Internal(format!("Failed to acquire read lock: {}", e)))?;

        Ok(resources.values().filter(|r| filter(r)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::AnyResource;

    fn resource(id: &str, title: &str) -> AnyResource {
        serde_json::from_value(serde_json::json!({ "id": id, "title": title })).unwrap()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let storage = MapStorage::new();
        storage.set(resource("a", "Album1")).await.unwrap();

        let got = storage.get("a").await.unwrap();
        assert_eq!(got.field("title"), Some(&serde_json::json!("Album1")));
        assert_eq!(storage.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let storage = MapStorage::<AnyResource>::new();
        assert_eq!(storage.get("nope").await.unwrap_err(), StorageError::NotFound);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let storage = MapStorage::new();
        storage.set(resource("a", "Old")).await.unwrap();
        storage.set(resource("a", "New")).await.unwrap();

        assert_eq!(storage.len().unwrap(), 1);
        let got = storage.get("a").await.unwrap();
        assert_eq!(got.field("title"), Some(&serde_json::json!("New")));
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let storage = MapStorage::new();
        storage.set(resource("a", "Album1")).await.unwrap();

        storage.delete("a").await.unwrap();
        assert_eq!(storage.delete("a").await.unwrap_err(), StorageError::NotFound);
        assert!(storage.is_empty().unwrap());
    }

    #[test]
    fn test_get_all_with_filter() {
        tokio_test::block_on(async {
            let storage = MapStorage::new();
            storage.set(resource("a", "keep")).await.unwrap();
            storage.set(resource("b", "drop")).await.unwrap();
            storage.set(resource("c", "keep")).await.unwrap();

            let mut kept: Vec<String> = storage
                .get_all(&|r: &AnyResource| r.field("title") == Some(&serde_json::json!("keep")))
                .await
                .unwrap()
                .into_iter()
                .map(|r| r.id().to_string())
                .collect();
            kept.sort();
            assert_eq!(kept, vec!["a", "c"]);

            let all = storage.get_all(&|_: &AnyResource| true).await.unwrap();
            assert_eq!(all.len(), 3);
        });
    }
}
