//! Storage contract for resources

use crate::core::error::StorageError;
use crate::core::resource::Resource;
use async_trait::async_trait;
use std::sync::Arc;

/// Predicate used to select resources from storage
pub type FilterFn<T> = Arc<dyn for<'a> Fn(&'a T) -> bool + Send + Sync>;

/// Backend that persists one resource type
///
/// Each call is atomic on its own; the contract gives no guarantee across
/// calls, so a `get` followed by a `set` may race with a concurrent `delete`.
#[async_trait]
pub trait Storage<T: Resource>: Send + Sync {
    /// Get a resource by ID, failing with [`StorageError::NotFound`] if absent
    async fn get(&self, id: &str) -> Result<T, StorageError>;

    /// Insert or overwrite a resource by its ID
    async fn set(&self, resource: T) -> Result<(), StorageError>;

    /// Delete a resource by ID, failing with [`StorageError::NotFound`] if absent
    async fn delete(&self, id: &str) -> Result<(), StorageError>;

    /// All resources for which `filter` returns true, in no particular order
    async fn get_all(
        &self,
        filter: &(dyn for<'a> Fn(&'a T) -> bool + Send + Sync),
    ) -> Result<Vec<T>, StorageError>;
}

#[async_trait]
impl<T: Resource, S: Storage<T> + ?Sized> Storage<T> for Arc<S> {
    async fn get(&self, id: &str) -> Result<T, StorageError> {
        (**self).get(id).await
    }

    async fn set(&self, resource: T) -> Result<(), StorageError> {
        (**self).set(resource).await
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        (**self).delete(id).await
    }

    async fn get_all(
        &self,
        filter: &(dyn for<'a> Fn(&'a T) -> bool + Send + Sync),
    ) -> Result<Vec<T>, StorageError> {
        (**self).get_all(filter).await
    }
}
