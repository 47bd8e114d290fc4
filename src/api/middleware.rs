//! Ancestor resolution and resource-aware middleware

use super::hooks::{GuardFn, MiddlewareFn};
use crate::core::context::{RequestContext, ResolvedResources};
use crate::core::error::{ApiError, ApiResult};
use crate::core::resource::Resource;
use crate::core::storage::Storage;
use axum::Router;
use axum::extract::Request;
use axum::middleware::{Next, from_fn};
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;

/// ID-scoped middleware registered on an API
pub(crate) enum IdMiddleware<T> {
    Plain(MiddlewareFn),
    WithResource(GuardFn<T>),
}

impl<T> Clone for IdMiddleware<T> {
    fn clone(&self) -> Self {
        match self {
            IdMiddleware::Plain(f) => IdMiddleware::Plain(f.clone()),
            IdMiddleware::WithResource(f) => IdMiddleware::WithResource(f.clone()),
        }
    }
}

impl<T: Resource> IdMiddleware<T> {
    /// Erase to a plain middleware, binding resource-aware checks to `storage`
    pub(crate) fn erase(&self, storage: &Arc<dyn Storage<T>>, name: &Arc<str>) -> MiddlewareFn {
        match self {
            IdMiddleware::Plain(f) => f.clone(),
            IdMiddleware::WithResource(guard) => {
                let storage = storage.clone();
                let name = name.clone();
                let guard = guard.clone();
                Arc::new(
                    move |req: Request, next: Next| -> BoxFuture<'static, Response> {
                        guard_resource(storage.clone(), name.clone(), guard.clone(), req, next)
                            .boxed()
                    },
                )
            }
        }
    }
}

/// The resource requested by ID for the API called `name`
///
/// Reuses the resource if middleware already resolved it for this request.
pub(crate) async fn load_requested<T: Resource>(
    storage: &dyn Storage<T>,
    ctx: &RequestContext,
    name: &str,
) -> ApiResult<T> {
    if let Some(resource) = ctx.resource::<T>(name) {
        return Ok(resource.clone());
    }
    let id = ctx.id_param(name).ok_or(ApiError::NotFound)?;
    Ok(storage.get(id).await?)
}

/// Resolve the parent resource into the request context, or answer 404
pub(crate) async fn resolve_resource<T: Resource>(
    storage: Arc<dyn Storage<T>>,
    name: Arc<str>,
    req: Request,
    next: Next,
) -> Response {
    if ResolvedResources::is_resolved(req.extensions(), &name) {
        return next.run(req).await;
    }

    let (mut parts, body) = req.into_parts();
    let ctx = RequestContext::from_parts(&mut parts, &()).await;

    match load_requested(storage.as_ref(), &ctx, &name).await {
        Ok(resource) => ResolvedResources::insert_into(&mut parts.extensions, &name, resource),
        Err(err) => {
            tracing::debug!(api = %name, uri = %parts.uri, "parent resolution failed");
            return err.into_response();
        }
    }

    next.run(Request::from_parts(parts, body)).await
}

/// Load the requested resource, run `guard` on it and keep it resolved
async fn guard_resource<T: Resource>(
    storage: Arc<dyn Storage<T>>,
    name: Arc<str>,
    guard: GuardFn<T>,
    req: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();
    let ctx = RequestContext::from_parts(&mut parts, &()).await;

    let resource = match load_requested(storage.as_ref(), &ctx, &name).await {
        Ok(resource) => resource,
        Err(err) => return err.into_response(),
    };

    if let Err(err) = guard(ctx, resource.clone()).await {
        return err.into_response();
    }

    ResolvedResources::insert_into(&mut parts.extensions, &name, resource);
    next.run(Request::from_parts(parts, body)).await
}

/// Wrap every route of `router` with `middlewares`, first registered outermost
pub(crate) fn apply_middlewares(router: Router, middlewares: &[MiddlewareFn]) -> Router {
    middlewares.iter().rev().fold(router, |router, mw| {
        let mw = mw.clone();
        router.route_layer(from_fn(move |req: Request, next: Next| mw(req, next)))
    })
}

/// Wrap every route of `router` with parent resolution for the API `name`
pub(crate) fn apply_resolution<T: Resource>(
    router: Router,
    storage: Arc<dyn Storage<T>>,
    name: Arc<str>,
) -> Router {
    router.route_layer(from_fn(move |req: Request, next: Next| {
        resolve_resource(storage.clone(), name.clone(), req, next)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::AnyResource;
    use crate::storage::MapStorage;
    use axum::http::{Method, StatusCode, Uri};

    #[tokio::test]
    async fn test_load_requested_prefers_context() {
        let storage: MapStorage<AnyResource> = MapStorage::new();
        let cached: AnyResource =
            serde_json::from_value(serde_json::json!({ "id": "a1", "name": "cached" })).unwrap();
        let ctx = RequestContext::new(Method::GET, Uri::from_static("/artists/a1"))
            .with_param("artists_id", "a1")
            .with_resource("artists", cached.clone());

        let loaded = load_requested(&storage, &ctx, "artists").await.unwrap();
        assert_eq!(loaded, cached);
    }

    #[tokio::test]
    async fn test_load_requested_missing() {
        let storage: MapStorage<AnyResource> = MapStorage::new();
        let ctx = RequestContext::new(Method::GET, Uri::from_static("/artists/a1"))
            .with_param("artists_id", "a1");
        let err = load_requested(&storage, &ctx, "artists").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let no_param = RequestContext::new(Method::GET, Uri::from_static("/artists"));
        assert_eq!(
            load_requested(&storage, &no_param, "artists")
                .await
                .unwrap_err(),
            ApiError::NotFound
        );
    }
}
