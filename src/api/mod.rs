//! API definitions: typed resource APIs, root APIs and their route trees
//!
//! An [`Api`] binds one [`Resource`] type to a base path, a storage backend
//! and a set of hooks. APIs nest into trees with [`Api::nest`]; the router
//! built from the top of a tree serves every resource at
//! `/{rootBase}[/{rootID}/{childBase}[/{childID}/...]]` and resolves each
//! ancestor into the [`RequestContext`] before a child handler runs.
//!
//! Middleware order for a request on a nested resource:
//!
//! 1. middleware added with [`Api::add_middleware`] on each ancestor, outermost first
//! 2. ID middleware of each ancestor, then its resolution into the context
//! 3. middleware and ID middleware of the API that owns the route
//! 4. the handler

pub mod codes;
pub mod handlers;
pub mod hooks;
pub mod middleware;
pub mod node;
pub mod render;
pub mod root;

pub use codes::ResponseCodes;
pub use handlers::Operation;
pub use hooks::MiddlewareFn;
pub use node::{ApiNode, RouteTable};
pub use root::RootApi;

use crate::client::{Client, ClientError};
use crate::core::context::RequestContext;
use crate::core::error::{ApiResult, ConfigError};
use crate::core::path::RoutePath;
use crate::core::resource::{AnyResource, Render, Resource};
use crate::core::storage::{FilterFn, Storage};
use crate::storage::MapStorage;
use axum::Router;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::handler::Handler;
use axum::routing::{MethodRouter, on};
use futures::FutureExt;
use handlers::{Handlers, Overrides, collection_routes, item_routes};
use hooks::{Hooks, InstanceFn, erase_middleware};
use middleware::{IdMiddleware, apply_middlewares, apply_resolution};
use node::{NodeConfig, merge, routes_at, typed_client};
use render::render_payload;
use std::any::Any;
use std::sync::Arc;

/// CRUD API for one resource type
///
/// All configuration happens through consuming builder calls before the
/// router is built; nothing can be changed while serving.
///
/// # Example
///
/// ```rust,ignore
/// let albums = Api::new("albums", "/albums", Album::default)
///     .set_get_all_filter(|ctx| {
///         let title = ctx.query("title").map(str::to_string);
///         Ok(move |album: &Album| title.as_deref().is_none_or(|t| album.title == t))
///     });
///
/// let artists = Api::new("artists", "/artists", Artist::default).nest(albums)?;
/// let router = artists.router()?;
/// ```
pub struct Api<T: Resource> {
    node: NodeConfig,
    instance: InstanceFn<T>,
    storage: Arc<dyn Storage<T>>,
    hooks: Hooks<T>,
    custom_id_routes: Vec<(String, MethodRouter)>,
    id_middlewares: Vec<IdMiddleware<T>>,
    overrides: Overrides,
}

impl<T: Resource> Api<T> {
    /// Create an API named `name` served at `base`
    ///
    /// `instance` produces the zero value that request bodies are bound onto.
    pub fn new(
        name: impl Into<String>,
        base: impl Into<String>,
        instance: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            node: NodeConfig::new(name, base),
            instance: Arc::new(instance),
            storage: Arc::new(MapStorage::<T>::new()),
            hooks: Hooks::default(),
            custom_id_routes: Vec::new(),
            id_middlewares: Vec::new(),
            overrides: Overrides::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn base(&self) -> &str {
        &self.node.base
    }

    /// Storage backing this API, for use in custom routes and hooks
    pub fn storage(&self) -> Arc<dyn Storage<T>> {
        self.storage.clone()
    }

    /// Replace the default in-memory storage
    pub fn set_storage(mut self, storage: impl Storage<T> + 'static) -> Self {
        self.storage = Arc::new(storage);
        self
    }

    /// Change the success status returned (and expected by clients) for `method`
    pub fn set_custom_response_code(mut self, method: Method, status: StatusCode) -> Self {
        self.node.codes.set(method, status);
        self
    }

    /// Wrap each resource in another renderable type before responding
    ///
    /// The wrapper receives the request context, so it can read ancestors
    /// resolved for this request.
    pub fn set_response_wrapper<R, F>(mut self, wrapper: F) -> Self
    where
        R: Render,
        F: Fn(T, &RequestContext) -> R + Send + Sync + 'static,
    {
        self.hooks.response_wrapper =
            Arc::new(move |resource: T, ctx: &RequestContext, html: bool| {
                render_payload(wrapper(resource, ctx), ctx, html)
            });
        self
    }

    /// Build the whole GET-all response from the filtered resources
    ///
    /// Replaces the default `{"items": [...]}` envelope.
    pub fn set_get_all_response_wrapper<R, F>(mut self, wrapper: F) -> Self
    where
        R: Render,
        F: Fn(Vec<T>, &RequestContext) -> R + Send + Sync + 'static,
    {
        self.hooks.get_all_response_wrapper =
            Some(Arc::new(move |resources: Vec<T>, ctx: &RequestContext| {
                render_payload(wrapper(resources, ctx), ctx, true)
            }));
        self
    }

    /// Build a per-request filter for GET-all, typically from query parameters
    pub fn set_get_all_filter<F, P>(mut self, factory: F) -> Self
    where
        F: Fn(&RequestContext) -> ApiResult<P> + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.hooks.get_all_filter = Some(Arc::new(move |ctx: &RequestContext| {
            let filter: FilterFn<T> = Arc::new(factory(ctx)?);
            Ok(filter)
        }));
        self
    }

    /// Run on POST, PUT and PATCH right before the resource is stored
    pub fn set_on_create_or_update<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext, &mut T) -> ApiResult<()> + Send + Sync + 'static,
    {
        self.hooks.on_create_or_update = Arc::new(hook);
        self
    }

    /// Run before deleting; an error cancels the delete
    pub fn set_before_delete<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<()>> + Send + 'static,
    {
        self.hooks.before_delete =
            Arc::new(move |ctx: RequestContext, id: String| hook(ctx, id).boxed());
        self
    }

    /// Run after deleting; an error is reported but the delete stays committed
    pub fn set_after_delete<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<()>> + Send + 'static,
    {
        self.hooks.after_delete =
            Arc::new(move |ctx: RequestContext, id: String| hook(ctx, id).boxed());
        self
    }

    /// Serve `operation` with `handler` instead of the default
    ///
    /// The handler is mounted where the default was, behind the same
    /// middleware and ancestor resolution, and can extract the
    /// [`RequestContext`] like any custom route.
    ///
    /// ```rust,ignore
    /// let events = Api::new("events", "/events", Event::default).set_handler(
    ///     Operation::GetAll,
    ///     |ctx: RequestContext| async move {
    ///         if ctx.accepts_html() { Ok(list_page()) } else { Err(ApiError::Forbidden) }
    ///     },
    /// );
    /// ```
    pub fn set_handler<H, X>(mut self, operation: Operation, handler: H) -> Self
    where
        H: Handler<X, ()>,
        X: 'static,
    {
        self.overrides
            .insert(operation, on(operation.method_filter(), handler));
        self
    }

    /// Add a route below the base path: `/base/{path}`
    pub fn add_custom_route(mut self, path: impl Into<String>, route: MethodRouter) -> Self {
        self.node.custom_routes.push((path.into(), route));
        self
    }

    /// Add a route below the resource ID: `/base/{id}/{path}`
    ///
    /// The requested resource is resolved into the [`RequestContext`] under
    /// this API's name before the handler runs.
    pub fn add_custom_id_route(mut self, path: impl Into<String>, route: MethodRouter) -> Self {
        self.custom_id_routes.push((path.into(), route));
        self
    }

    /// Add a route at an absolute path; only valid while this API is the top of its tree
    pub fn add_custom_root_route(mut self, path: impl Into<String>, route: MethodRouter) -> Self {
        self.node.root_routes.push((path.into(), route));
        self
    }

    /// Add middleware to every route under this API's base path
    pub fn add_middleware<F, Fut, Out>(mut self, middleware: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Out> + Send + 'static,
        Out: IntoResponse + 'static,
    {
        self.node.middlewares.push(erase_middleware(middleware));
        self
    }

    /// Add middleware to every route that carries this API's resource ID
    pub fn add_id_middleware<F, Fut, Out>(mut self, middleware: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Out> + Send + 'static,
        Out: IntoResponse + 'static,
    {
        self.id_middlewares
            .push(IdMiddleware::Plain(erase_middleware(middleware)));
        self
    }

    /// Add an ID middleware that receives the requested resource
    ///
    /// The resource is loaded (404 if it does not exist) and handed to
    /// `check`; an error ends the request. On success the resource stays
    /// resolved in the context, so it is not loaded again downstream.
    pub fn add_id_middleware_with_resource<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn(RequestContext, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<()>> + Send + 'static,
    {
        self.id_middlewares.push(IdMiddleware::WithResource(Arc::new(
            move |ctx: RequestContext, resource: T| check(ctx, resource).boxed(),
        )));
        self
    }

    /// Attach a child API below this API's resource ID
    pub fn nest(mut self, child: impl ApiNode) -> Result<Self, ConfigError> {
        self.node.add_child(Box::new(child))?;
        Ok(self)
    }

    /// Client for this API, as the top of its tree
    pub fn client(&self, address: &str) -> Client<T> {
        let path = RoutePath::root().child(&self.node.name, &self.node.base, true);
        Client::new(address, path).with_response_codes(self.node.codes.clone())
    }

    /// Schemaless client for this API, as the top of its tree
    pub fn any_client(&self, address: &str) -> Client<AnyResource> {
        let path = RoutePath::root().child(&self.node.name, &self.node.base, true);
        Client::new(address, path).with_response_codes(self.node.codes.clone())
    }

    /// Client for a descendant, found by child names from this API down
    pub fn nested_client<C: Resource>(
        &self,
        address: &str,
        names: &[&str],
    ) -> Result<Client<C>, ClientError> {
        typed_client(self, address, names)
    }

    fn handlers(&self) -> Handlers<T> {
        Handlers {
            name: self.node.name.clone(),
            instance: self.instance.clone(),
            storage: self.storage.clone(),
            hooks: self.hooks.clone(),
            codes: self.node.codes.clone(),
        }
    }
}

impl<T: Resource> ApiNode for Api<T> {
    fn name(&self) -> &str {
        &self.node.name
    }

    fn base(&self) -> &str {
        &self.node.base
    }

    fn takes_id(&self) -> bool {
        true
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

        let path = parent.child(&self.node.name, &self.node.base, true);
        let collection_path = path.collection_pattern();
        let item_path = path.item_pattern();
        let name: Arc<str> = Arc::from(self.node.name.as_str());
        let handlers = Arc::new(self.handlers());

        routes.claim(&collection_path)?;
        routes.claim(&item_path)?;

        let mut collection = Router::new().route(
            &collection_path,
            collection_routes(handlers.clone(), &self.overrides),
        );
        if let Some(custom) = self.node.custom_router(&collection_path, routes)? {
            collection = collection.merge(custom);
        }

        // Routes below the ID need this resource resolved first
        let scoped = merge(
            routes_at(&item_path, &self.custom_id_routes, routes)?,
            self.node.children_router(&path, routes)?,
        )
        .map(|scoped| apply_resolution(scoped, self.storage.clone(), name.clone()));

        let mut item = Router::new().route(&item_path, item_routes(handlers, &self.overrides));
        if let Some(scoped) = scoped {
            item = item.merge(scoped);
        }
        let id_middlewares: Vec<MiddlewareFn> = self
            .id_middlewares
            .iter()
            .map(|m| m.erase(&self.storage, &name))
            .collect();
        let item = apply_middlewares(item, &id_middlewares);

        tracing::debug!(api = %self.node.name, path = %collection_path, "built routes");
        self.node.finish(Some(collection.merge(item)), parent, routes)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
