//! API nodes without a resource of their own

use super::codes::ResponseCodes;
use super::hooks::erase_middleware;
use super::node::{ApiNode, NodeConfig, RouteTable, merge, typed_client};
use crate::client::{Client, ClientError};
use crate::core::error::ConfigError;
use crate::core::path::RoutePath;
use crate::core::resource::Resource;
use axum::Router;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::MethodRouter;
use std::any::Any;

/// Groups child APIs under a shared base path, like `/api/v1`
///
/// A root API has no storage and takes no ID, so its children are mounted
/// directly below its base: `/api/v1/artists/{artists_id}`.
pub struct RootApi {
    node: NodeConfig,
}

impl RootApi {
    pub fn new(name: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            node: NodeConfig::new(name, base),
        }
    }

    /// Add a route below the base path
    pub fn add_custom_route(mut self, path: impl Into<String>, route: MethodRouter) -> Self {
        self.node.custom_routes.push((path.into(), route));
        self
    }

    /// Add a route at an absolute path; only valid at the top of the tree
    pub fn add_custom_root_route(mut self, path: impl Into<String>, route: MethodRouter) -> Self {
        self.node.root_routes.push((path.into(), route));
        self
    }

    /// Add middleware to every route under the base path, children included
    pub fn add_middleware<F, Fut, Out>(mut self, middleware: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Out> + Send + 'static,
        Out: IntoResponse + 'static,
    {
        self.node.middlewares.push(erase_middleware(middleware));
        self
    }

    pub fn nest(mut self, child: impl ApiNode) -> Result<Self, ConfigError> {
        self.node.add_child(Box::new(child))?;
        Ok(self)
    }

    /// Client for a descendant, found by child names from this root down
    pub fn nested_client<C: Resource>(
        &self,
        address: &str,
        names: &[&str],
    ) -> Result<Client<C>, ClientError> {
        typed_client(self, address, names)
    }
}

impl ApiNode for RootApi {
    fn name(&self) -> &str {
        &self.node.name
    }

    fn base(&self) -> &str {
        &self.node.base
    }

    fn takes_id(&self) -> bool {
        false
    }

    fn response_codes(&self) -> &ResponseCodes {
        &self.node.codes
    }

    fn children(&self) -> &[Box<dyn ApiNode>] {
        &self.node.children
    }

    fn build_router(
        &self,
        parent: &RoutePath,
        routes: &mut RouteTable,
    ) -> Result<Option<Router>, ConfigError> {
        self.node.check_chain(parent)?;

        let path = parent.child(&self.node.name, &self.node.base, false);
        let router = merge(
            self.node.custom_router(&path.collection_pattern(), routes)?,
            self.node.children_router(&path, routes)?,
        );

        tracing::debug!(api = %self.node.name, path = %path.collection_pattern(), "built routes");
        self.node.finish(router, parent, routes)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
