//! Type-erased API tree nodes and the configuration every node shares

use super::codes::ResponseCodes;
use super::hooks::MiddlewareFn;
use super::middleware::apply_middlewares;
use crate::client::{Client, ClientError};
use crate::core::error::ConfigError;
use crate::core::path::{RoutePath, id_param_name, join_paths};
use crate::core::resource::Resource;
use axum::Router;
use axum::routing::MethodRouter;
use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// One node of an API tree, independent of its resource type
///
/// Implemented by [`Api`](super::Api) and [`RootApi`](super::RootApi). A
/// parent owns its children as `Box<dyn ApiNode>`; children never point back
/// at their parent; the ancestor chain is passed down as a [`RoutePath`] when
/// routers and clients are built.
pub trait ApiNode: Send + Sync + 'static {
    /// Name, unique among siblings, used as the context key for this resource
    fn name(&self) -> &str;

    /// Base path relative to the parent
    fn base(&self) -> &str;

    /// Whether resources are addressed by ID below this node (false for root APIs)
    fn takes_id(&self) -> bool;

    fn response_codes(&self) -> &ResponseCodes;

    fn children(&self) -> &[Box<dyn ApiNode>];

    /// Routes for this node and its subtree, or `None` if it has none
    ///
    /// Every route pattern is claimed in `routes` first, so overlapping
    /// routes anywhere in the tree are reported instead of panicking.
    fn build_router(
        &self,
        parent: &RoutePath,
        routes: &mut RouteTable,
    ) -> Result<Option<Router>, ConfigError>;

    fn as_any(&self) -> &dyn Any;

    /// Router serving this node as the top of the tree
    fn router(&self) -> Result<Router, ConfigError> {
        let mut routes = RouteTable::default();
        Ok(self
            .build_router(&RoutePath::root(), &mut routes)?
            .unwrap_or_default())
    }
}

/// Route patterns already registered while building one tree
///
/// Patterns are compared by shape, with parameter names ignored, since
/// `/albums/{albums_id}` and `/albums/{records_id}` match the same requests.
#[derive(Debug, Default)]
pub struct RouteTable {
    claimed: HashMap<String, String>,
}

impl RouteTable {
    /// Register `pattern`, failing if a route of the same shape exists
    pub fn claim(&mut self, pattern: &str) -> Result<(), ConfigError> {
        match self.claimed.entry(route_shape(pattern)) {
            Entry::Occupied(existing) => Err(ConfigError::RouteConflict {
                path: pattern.to_string(),
                existing: existing.get().clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(pattern.to_string());
                Ok(())
            }
        }
    }
}

fn route_shape(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|segment| {
            if segment.starts_with("{*") {
                "{*}"
            } else if segment.starts_with('{') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Configuration shared by typed and root APIs
pub(crate) struct NodeConfig {
    pub name: String,
    pub base: String,
    pub codes: ResponseCodes,
    pub middlewares: Vec<MiddlewareFn>,
    pub custom_routes: Vec<(String, MethodRouter)>,
    pub root_routes: Vec<(String, MethodRouter)>,
    pub children: Vec<Box<dyn ApiNode>>,
}

impl NodeConfig {
    pub fn new(name: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: base.into(),
            codes: ResponseCodes::default(),
            middlewares: Vec::new(),
            custom_routes: Vec::new(),
            root_routes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn add_child(&mut self, child: Box<dyn ApiNode>) -> Result<(), ConfigError> {
        if self.children.iter().any(|c| c.name() == child.name()) {
            return Err(ConfigError::DuplicateName {
                parent: self.name.clone(),
                name: child.name().to_string(),
            });
        }
        self.children.push(child);
        Ok(())
    }

    /// Reject a name already used by an ancestor, since URL parameters would collide
    pub fn check_chain(&self, parent: &RoutePath) -> Result<(), ConfigError> {
        let param = id_param_name(&self.name);
        match parent.segments().iter().find(|s| s.id_param() == param) {
            Some(clash) => Err(ConfigError::DuplicateName {
                parent: clash.name().to_string(),
                name: self.name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Custom routes relative to `prefix`
    pub fn custom_router(
        &self,
        prefix: &str,
        routes: &mut RouteTable,
    ) -> Result<Option<Router>, ConfigError> {
        routes_at(prefix, &self.custom_routes, routes)
    }

    /// Merged routers of all children, built below `path`
    pub fn children_router(
        &self,
        path: &RoutePath,
        routes: &mut RouteTable,
    ) -> Result<Option<Router>, ConfigError> {
        let mut router = None;
        for child in &self.children {
            router = merge(router, child.build_router(path, routes)?);
        }
        Ok(router)
    }

    /// Apply this node's middleware to its routes and add root routes
    pub fn finish(
        &self,
        router: Option<Router>,
        parent: &RoutePath,
        routes: &mut RouteTable,
    ) -> Result<Option<Router>, ConfigError> {
        let router = router.map(|r| apply_middlewares(r, &self.middlewares));

        if self.root_routes.is_empty() {
            return Ok(router);
        }
        if !parent.segments().is_empty() {
            return Err(ConfigError::RootRouteOnChild {
                name: self.name.clone(),
            });
        }
        Ok(merge(router, routes_at("/", &self.root_routes, routes)?))
    }
}

pub(crate) fn routes_at(
    prefix: &str,
    custom: &[(String, MethodRouter)],
    routes: &mut RouteTable,
) -> Result<Option<Router>, ConfigError> {
    let mut router = None;
    for (path, method_router) in custom {
        let pattern = join_paths(prefix, path);
        routes.claim(&pattern)?;
        router = merge(router, Some(Router::new().route(&pattern, method_router.clone())));
    }
    Ok(router)
}

pub(crate) fn merge(a: Option<Router>, b: Option<Router>) -> Option<Router> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.merge(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Find a descendant of `top` by names, returning it with its full route path
pub(crate) fn find_node<'a>(
    top: &'a dyn ApiNode,
    names: &[&str],
) -> Result<(&'a dyn ApiNode, RoutePath), ClientError> {
    let mut path = RoutePath::root().child(top.name(), top.base(), top.takes_id());
    let mut node = top;
    for name in names {
        let child = node
            .children()
            .iter()
            .find(|c| c.name() == *name)
            .ok_or_else(|| ClientError::UnknownResource(name.to_string()))?;
        path = path.child(child.name(), child.base(), child.takes_id());
        node = child.as_ref();
    }
    Ok((node, path))
}

/// Typed client for a descendant of `top`
pub(crate) fn typed_client<C: Resource>(
    top: &dyn ApiNode,
    address: &str,
    names: &[&str],
) -> Result<Client<C>, ClientError> {
    let (node, path) = find_node(top, names)?;
    if !node.as_any().is::<super::Api<C>>() {
        return Err(ClientError::TypeMismatch(node.name().to_string()));
    }
    Ok(Client::new(address, path).with_response_codes(node.response_codes().clone()))
}
