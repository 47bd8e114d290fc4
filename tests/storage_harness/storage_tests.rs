//! Macro-generated test suite for `Storage<Album>` contract validation.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//!
//! use storage_harness::*;
//! use nestapi::storage::MapStorage;
//!
//! storage_tests!(MapStorage::<Album>::new());
//! ```
//!
//! # Generated Tests
//!
//! - `test_set_and_get`: store then retrieve, all fields intact
//! - `test_get_missing`: unknown ID is `StorageError::NotFound`
//! - `test_set_overwrites`: a second set with the same ID replaces the first
//! - `test_delete_existing`: delete then get is `NotFound`
//! - `test_delete_missing`: deleting an unknown ID is `NotFound`
//! - `test_get_all_empty`: empty store lists nothing
//! - `test_get_all_filter`: filter selects exactly the matching set
//! - `test_concurrent_access`: parallel sets from spawned tasks all land

/// Generate a `Storage<Album>` conformance test suite.
///
/// `$factory` is re-evaluated for each test, so every test starts empty.
#[macro_export]
macro_rules! storage_tests {
    ($factory:expr) => {
        mod storage_contract_tests {
            use super::*;
            use nestapi::core::{Storage, StorageError};
            use std::collections::HashSet;
            use std::sync::Arc;

            fn storage() -> Arc<dyn Storage<Album>> {
                Arc::new($factory)
            }

            #[tokio::test]
            async fn test_set_and_get() {
                let storage = storage();
                let album = stored_album("a1", "Album1", 2001);

                storage.set(album.clone()).await.unwrap();

                let retrieved = storage.get("a1").await.unwrap();
                assert_eq!(retrieved, album);
            }

            #[tokio::test]
            async fn test_get_missing() {
                let storage = storage();
                assert_eq!(
                    storage.get("nope").await.unwrap_err(),
                    StorageError::NotFound
                );
            }

            #[tokio::test]
            async fn test_set_overwrites() {
                let storage = storage();
                storage
                    .set(stored_album("a1", "Album1", 2001))
                    .await
                    .unwrap();
                storage
                    .set(stored_album("a1", "Renamed", 2002))
                    .await
                    .unwrap();

                let retrieved = storage.get("a1").await.unwrap();
                assert_eq!(retrieved.title, "Renamed");
                assert_eq!(storage.get_all(&|_: &Album| true).await.unwrap().len(), 1);
            }

            #[tokio::test]
            async fn test_delete_existing() {
                let storage = storage();
                storage
                    .set(stored_album("a1", "Album1", 2001))
                    .await
                    .unwrap();

                storage.delete("a1").await.unwrap();
                assert_eq!(storage.get("a1").await.unwrap_err(), StorageError::NotFound);
            }

            #[tokio::test]
            async fn test_delete_missing() {
                let storage = storage();
                assert_eq!(
                    storage.delete("nope").await.unwrap_err(),
                    StorageError::NotFound
                );
            }

            #[tokio::test]
            async fn test_get_all_empty() {
                let storage = storage();
                assert!(storage.get_all(&|_: &Album| true).await.unwrap().is_empty());
            }

            #[tokio::test]
            async fn test_get_all_filter() {
                let storage = storage();
                for (id, title, year) in [
                    ("a1", "Album1", 1999),
                    ("a2", "Album2", 2005),
                    ("a3", "Album3", 2010),
                ] {
                    storage.set(stored_album(id, title, year)).await.unwrap();
                }

                let recent: HashSet<String> = storage
                    .get_all(&|album: &Album| album.year > 2000)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|album| album.resource.id)
                    .collect();

                let expected: HashSet<String> = ["a2", "a3"].iter().map(|s| s.to_string()).collect();
                assert_eq!(recent, expected);
            }

            #[tokio::test]
            async fn test_concurrent_access() {
                let storage = storage();
                let mut handles = Vec::new();
                for i in 0..10 {
                    let storage = storage.clone();
                    handles.push(tokio::spawn(async move {
                        let album = stored_album(&format!("a{}", i), &format!("Album{}", i), 2000 + i);
                        storage.set(album).await.unwrap();
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }

                let all = storage.get_all(&|_: &Album| true).await.unwrap();
                assert_eq!(all.len(), 10);
            }
        }
    };
}
