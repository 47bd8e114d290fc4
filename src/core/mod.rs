//! Core module containing the resource, storage and request contracts

pub mod context;
pub mod error;
pub mod path;
pub mod resource;
pub mod storage;

pub use context::{RequestContext, ResolvedResources};
pub use error::{ApiError, ApiResult, ConfigError, ErrorResponse, StorageError};
pub use path::{PathError, RoutePath, RouteSegment};
pub use resource::{AnyResource, DefaultResource, Render, Resource, ResourceList};
pub use storage::{FilterFn, Storage};
