//! # nestapi
//!
//! A framework for serving plain Rust types as nested CRUD REST APIs, with a
//! typed client that mirrors the server's routes.
//!
//! ## Features
//!
//! - **Generic CRUD**: GET/POST/PUT/PATCH/DELETE for any [`Resource`](core::Resource)
//! - **Nesting**: `/artists/{id}/albums/{id}/songs` with ancestors resolved before child handlers
//! - **Pluggable Storage**: in-memory by default, any [`Storage`](core::Storage) backend
//! - **Hooks**: filters, response wrappers, create/update and delete hooks, middleware
//! - **Client Mirror**: clients render URLs with the same path function as the router
//! - **Table Tests**: [`testing::TableTest`] drives a running tree through its clients
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nestapi::prelude::*;
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Album {
//!     #[serde(flatten)]
//!     resource: DefaultResource,
//!     title: String,
//! }
//!
//! impl Render for Album {}
//!
//! impl Resource for Album {
//!     fn identity(&self) -> &DefaultResource { &self.resource }
//!     fn identity_mut(&mut self) -> &mut DefaultResource { &mut self.resource }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let albums = Api::new("albums", "/albums", Album::default);
//!     Server::new(&albums)?.serve().await
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod core;
pub mod server;
pub mod storage;
pub mod testing;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Traits ===
    pub use crate::core::{
        AnyResource, DefaultResource, Render, RequestContext, Resource, ResourceList, Storage,
    };

    // === Errors ===
    pub use crate::core::{ApiError, ApiResult, ConfigError, StorageError};

    // === APIs ===
    pub use crate::api::{Api, ApiNode, Operation, ResponseCodes, RootApi};

    // === Client ===
    pub use crate::client::{Client, ClientError, ClientMap, Command, Verb};

    // === Storage ===
    pub use crate::storage::MapStorage;

    // === Server ===
    pub use crate::config::ServerConfig;
    pub use crate::server::{Server, ServerHandle};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};

    // === Axum ===
    pub use axum::{
        Router,
        extract::Request,
        http::{Method, StatusCode},
        middleware::Next,
        routing::{delete, get, patch, post, put},
    };
}
