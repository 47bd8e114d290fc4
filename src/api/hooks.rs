//! Hook types stored on an API and their no-op defaults

use super::render::{Payload, render_payload};
use crate::core::context::RequestContext;
use crate::core::error::ApiResult;
use crate::core::resource::Resource;
use crate::core::storage::FilterFn;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Produces the zero-value resource used as a binding target
pub(crate) type InstanceFn<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Wraps one resource before rendering; the flag allows an HTML payload
pub(crate) type ResponseWrapperFn<T> =
    Arc<dyn Fn(T, &RequestContext, bool) -> ApiResult<Payload> + Send + Sync>;

pub(crate) type ListWrapperFn<T> =
    Arc<dyn Fn(Vec<T>, &RequestContext) -> ApiResult<Payload> + Send + Sync>;

pub(crate) type FilterFactory<T> =
    Arc<dyn Fn(&RequestContext) -> ApiResult<FilterFn<T>> + Send + Sync>;

pub(crate) type MutateHook<T> =
    Arc<dyn Fn(&RequestContext, &mut T) -> ApiResult<()> + Send + Sync>;

/// Before/after delete hook, given the request and the ID being deleted
pub(crate) type DeleteHook =
    Arc<dyn Fn(RequestContext, String) -> BoxFuture<'static, ApiResult<()>> + Send + Sync>;

/// Type-erased axum middleware
pub type MiddlewareFn = Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync>;

/// Check run against the requested resource before the request continues
pub(crate) type GuardFn<T> =
    Arc<dyn Fn(RequestContext, T) -> BoxFuture<'static, ApiResult<()>> + Send + Sync>;

/// All replaceable behavior of one API
pub(crate) struct Hooks<T> {
    pub response_wrapper: ResponseWrapperFn<T>,
    pub get_all_response_wrapper: Option<ListWrapperFn<T>>,
    pub get_all_filter: Option<FilterFactory<T>>,
    pub on_create_or_update: MutateHook<T>,
    pub before_delete: DeleteHook,
    pub after_delete: DeleteHook,
}

impl<T> Clone for Hooks<T> {
    fn clone(&self) -> Self {
        Self {
            response_wrapper: self.response_wrapper.clone(),
            get_all_response_wrapper: self.get_all_response_wrapper.clone(),
            get_all_filter: self.get_all_filter.clone(),
            on_create_or_update: self.on_create_or_update.clone(),
            before_delete: self.before_delete.clone(),
            after_delete: self.after_delete.clone(),
        }
    }
}

impl<T: Resource> Default for Hooks<T> {
    fn default() -> Self {
        Self {
            response_wrapper: Arc::new(|resource: T, ctx: &RequestContext, html: bool| {
                render_payload(resource, ctx, html)
            }),
            get_all_response_wrapper: None,
            get_all_filter: None,
            on_create_or_update: Arc::new(|_: &RequestContext, _: &mut T| Ok(())),
            before_delete: noop_delete_hook(),
            after_delete: noop_delete_hook(),
        }
    }
}

pub(crate) fn noop_delete_hook() -> DeleteHook {
    Arc::new(|_: RequestContext, _: String| -> BoxFuture<'static, ApiResult<()>> {
        Box::pin(async { Ok(()) })
    })
}

/// Box a user middleware so it can be stored and layered later
pub(crate) fn erase_middleware<F, Fut, Out>(middleware: F) -> MiddlewareFn
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoResponse + 'static,
{
    Arc::new(move |req: Request, next: Next| -> BoxFuture<'static, Response> {
        middleware(req, next).map(IntoResponse::into_response).boxed()
    })
}
