//! Integration tests for MapStorage using the storage test harness.
//!
//! This file invokes `storage_tests!` to validate that MapStorage fully
//! conforms to the Storage<T> contract, directly and behind an `Arc`.

#[macro_use]
mod storage_harness;

use nestapi::storage::MapStorage;
use storage_harness::*;

storage_tests!(MapStorage::<Album>::new());

mod shared {
    use super::*;
    use std::sync::Arc;

    storage_tests!(Arc::new(MapStorage::<Album>::new()));
}
