//! Default CRUD handlers shared by every API

use super::codes::ResponseCodes;
use super::hooks::{Hooks, InstanceFn};
use super::middleware::load_requested;
use super::render::{Payload, render_payload};
use crate::core::context::RequestContext;
use crate::core::error::{ApiError, ApiResult, StorageError};
use crate::core::resource::{Resource, ResourceList, new_id};
use crate::core::storage::{FilterFn, Storage};
use axum::body::Bytes;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter, delete, get, patch, post, put};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything the default handlers of one API need at request time
pub(crate) struct Handlers<T: Resource> {
    pub name: String,
    pub instance: InstanceFn<T>,
    pub storage: Arc<dyn Storage<T>>,
    pub hooks: Hooks<T>,
    pub codes: ResponseCodes,
}

impl<T: Resource> Handlers<T> {
    /// GET on the collection
    pub async fn get_all(&self, ctx: RequestContext) -> ApiResult<Response> {
        let filter: FilterFn<T> = match &self.hooks.get_all_filter {
            Some(factory) => factory(&ctx)?,
            None => Arc::new(|_: &T| true),
        };

        let resources = self.storage.get_all(filter.as_ref()).await?;

        let payload = match &self.hooks.get_all_response_wrapper {
            Some(wrap) => wrap(resources, &ctx)?,
            None => {
                let items = resources
                    .into_iter()
                    .map(|r| (self.hooks.response_wrapper)(r, &ctx, false).map(Payload::into_json))
                    .collect::<ApiResult<Vec<_>>>()?;
                render_payload(ResourceList { items }, &ctx, true)?
            }
        };

        Ok(payload.into_response(self.codes.get(&Method::GET)))
    }

    /// GET on one resource
    pub async fn get(&self, ctx: RequestContext) -> ApiResult<Response> {
        let resource = load_requested(self.storage.as_ref(), &ctx, &self.name).await?;
        self.respond(resource, &ctx, &Method::GET)
    }

    /// POST on the collection
    ///
    /// A client-chosen ID is kept only if nothing is stored under it yet;
    /// replacing an existing resource is left to PUT.
    pub async fn post(&self, ctx: RequestContext, body: Bytes) -> ApiResult<Response> {
        let mut resource = self.bind_body(&body)?;

        if resource.id().is_empty() {
            resource.identity_mut().id = new_id();
        } else {
            self.check_unused(resource.id()).await?;
        }
        resource.identity_mut().created_at = Some(Utc::now());
        let identity = resource.identity().clone();

        resource.bind(&ctx)?;
        (self.hooks.on_create_or_update)(&ctx, &mut resource)?;
        *resource.identity_mut() = identity;

        self.storage.set(resource.clone()).await?;
        tracing::debug!(api = %self.name, id = %resource.id(), "created resource");

        self.respond(resource, &ctx, &Method::POST)
    }

    /// PUT on one resource: create or replace at the path ID
    pub async fn put(&self, ctx: RequestContext, body: Bytes) -> ApiResult<Response> {
        let id = self.path_id(&ctx)?;
        let mut resource = self.bind_body(&body)?;
        self.check_body_id(&resource, &id)?;
        resource.identity_mut().id = id.clone();

        resource.bind(&ctx)?;

        let created_at = match self.storage.get(&id).await {
            Ok(existing) => existing.identity().created_at,
            Err(StorageError::NotFound) => None,
            Err(err) => return Err(err.into()),
        };
        let identity = resource.identity_mut();
        identity.id = id;
        identity.created_at = created_at.or_else(|| Some(Utc::now()));
        let identity = identity.clone();

        (self.hooks.on_create_or_update)(&ctx, &mut resource)?;
        *resource.identity_mut() = identity;

        self.storage.set(resource.clone()).await?;
        tracing::debug!(api = %self.name, id = %resource.id(), "replaced resource");

        self.respond(resource, &ctx, &Method::PUT)
    }

    /// PATCH on one resource: merge a partial body into the stored resource
    pub async fn patch(&self, ctx: RequestContext, body: Bytes) -> ApiResult<Response> {
        let id = self.path_id(&ctx)?;
        let mut resource = self.storage.get(&id).await?;

        let mut partial = self.bind_body(&body)?;
        self.check_body_id(&partial, &id)?;
        partial.bind(&ctx)?;

        // Neither the merge nor the hook may move the resource to another ID
        let identity = resource.identity().clone();
        resource.patch(partial)?;
        *resource.identity_mut() = identity.clone();

        (self.hooks.on_create_or_update)(&ctx, &mut resource)?;
        *resource.identity_mut() = identity;

        self.storage.set(resource.clone()).await?;
        tracing::debug!(api = %self.name, id = %resource.id(), "patched resource");

        self.respond(resource, &ctx, &Method::PATCH)
    }

    /// DELETE on one resource
    pub async fn delete(&self, ctx: RequestContext) -> ApiResult<Response> {
        let id = self.path_id(&ctx)?;

        (self.hooks.before_delete)(ctx.clone(), id.clone()).await?;

        self.storage.delete(&id).await?;
        tracing::debug!(api = %self.name, id = %id, "deleted resource");

        // The delete is already committed; report the hook failure only
        if let Err(err) = (self.hooks.after_delete)(ctx, id.clone()).await {
            tracing::warn!(api = %self.name, id = %id, error = %err, "after-delete hook failed");
            return Err(err);
        }

        Ok(self.codes.get(&Method::DELETE).into_response())
    }

    fn respond(&self, resource: T, ctx: &RequestContext, method: &Method) -> ApiResult<Response> {
        let payload = (self.hooks.response_wrapper)(resource, ctx, true)?;
        Ok(payload.into_response(self.codes.get(method)))
    }

    fn path_id(&self, ctx: &RequestContext) -> ApiResult<String> {
        ctx.id_param(&self.name)
            .map(str::to_string)
            .ok_or(ApiError::NotFound)
    }

    async fn check_unused(&self, id: &str) -> ApiResult<()> {
        match self.storage.get(id).await {
            Ok(_) => Err(ApiError::custom(StatusCode::CONFLICT, "Conflict.")
                .with_detail(format!("resource '{}' already exists", id))),
            Err(StorageError::NotFound) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn check_body_id(&self, resource: &T, id: &str) -> ApiResult<()> {
        if resource.id().is_empty() || resource.id() == id {
            Ok(())
        } else {
            Err(ApiError::InvalidRequest(format!(
                "id '{}' does not match the path id '{}'",
                resource.id(),
                id
            )))
        }
    }

    /// Overlay the JSON body onto a fresh instance and decode it
    fn bind_body(&self, body: &[u8]) -> ApiResult<T> {
        let mut target = serde_json::to_value((self.instance)()).map_err(ApiError::internal)?;

        if !body.iter().all(u8::is_ascii_whitespace) {
            let incoming: serde_json::Value =
                serde_json::from_slice(body).map_err(ApiError::invalid)?;
            let serde_json::Value::Object(fields) = incoming else {
                return Err(ApiError::invalid("request body must be a JSON object"));
            };
            match &mut target {
                serde_json::Value::Object(existing) => existing.extend(fields),
                other => *other = serde_json::Value::Object(fields),
            }
        }

        serde_json::from_value(target).map_err(ApiError::invalid)
    }
}

/// One of the six default handlers an [`Api`](super::Api) serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `GET` on the collection
    GetAll,
    /// `GET` on one resource
    Get,
    /// `POST` on the collection
    Post,
    /// `PUT` on one resource
    Put,
    /// `PATCH` on one resource
    Patch,
    /// `DELETE` on one resource
    Delete,
}

impl Operation {
    pub fn method(&self) -> Method {
        match self {
            Operation::GetAll | Operation::Get => Method::GET,
            Operation::Post => Method::POST,
            Operation::Put => Method::PUT,
            Operation::Patch => Method::PATCH,
            Operation::Delete => Method::DELETE,
        }
    }

    /// Whether the operation is served on the item path rather than the collection
    pub fn on_item(&self) -> bool {
        !matches!(self, Operation::GetAll | Operation::Post)
    }

    pub(crate) fn method_filter(&self) -> MethodFilter {
        match self {
            Operation::GetAll | Operation::Get => MethodFilter::GET,
            Operation::Post => MethodFilter::POST,
            Operation::Put => MethodFilter::PUT,
            Operation::Patch => MethodFilter::PATCH,
            Operation::Delete => MethodFilter::DELETE,
        }
    }
}

/// Handlers registered in place of a default operation
pub(crate) type Overrides = HashMap<Operation, MethodRouter>;

/// `GET` and `POST` on the collection path
pub(crate) fn collection_routes<T: Resource>(
    handlers: Arc<Handlers<T>>,
    overrides: &Overrides,
) -> MethodRouter {
    let list = handlers.clone();
    let create = handlers;
    with_overrides(
        [
            (
                Operation::GetAll,
                get(move |ctx: RequestContext| async move { list.get_all(ctx).await }),
            ),
            (
                Operation::Post,
                post(move |ctx: RequestContext, body: Bytes| async move {
                    create.post(ctx, body).await
                }),
            ),
        ],
        overrides,
    )
}

/// `GET`, `PUT`, `PATCH` and `DELETE` on the item path
pub(crate) fn item_routes<T: Resource>(
    handlers: Arc<Handlers<T>>,
    overrides: &Overrides,
) -> MethodRouter {
    let read = handlers.clone();
    let replace = handlers.clone();
    let update = handlers.clone();
    let remove = handlers;
    with_overrides(
        [
            (
                Operation::Get,
                get(move |ctx: RequestContext| async move { read.get(ctx).await }),
            ),
            (
                Operation::Put,
                put(move |ctx: RequestContext, body: Bytes| async move {
                    replace.put(ctx, body).await
                }),
            ),
            (
                Operation::Patch,
                patch(move |ctx: RequestContext, body: Bytes| async move {
                    update.patch(ctx, body).await
                }),
            ),
            (
                Operation::Delete,
                delete(move |ctx: RequestContext| async move { remove.delete(ctx).await }),
            ),
        ],
        overrides,
    )
}

/// Combine per-method routers, preferring an override over the default
fn with_overrides(
    defaults: impl IntoIterator<Item = (Operation, MethodRouter)>,
    overrides: &Overrides,
) -> MethodRouter {
    defaults
        .into_iter()
        .fold(MethodRouter::new(), |router, (operation, default)| {
            let route = overrides.get(&operation).cloned().unwrap_or(default);
            router.merge(route)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::{DefaultResource, Render};
    use crate::storage::MapStorage;
    use axum::http::Uri;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Album {
        #[serde(flatten)]
        resource: DefaultResource,
        #[serde(default)]
        title: String,
        #[serde(default)]
        year: u32,
    }

    impl Render for Album {}

    impl Resource for Album {
        fn identity(&self) -> &DefaultResource {
            &self.resource
        }

        fn identity_mut(&mut self) -> &mut DefaultResource {
            &mut self.resource
        }
    }

    fn handlers() -> Handlers<Album> {
        Handlers {
            name: "albums".to_string(),
            instance: Arc::new(|| Album {
                year: 2000,
                ..Album::default()
            }),
            storage: Arc::new(MapStorage::new()),
            hooks: Hooks::default(),
            codes: ResponseCodes::default(),
        }
    }

    #[test]
    fn test_bind_body_overlays_instance_defaults() {
        let album = handlers().bind_body(br#"{"title":"Album1"}"#).unwrap();
        assert_eq!(album.title, "Album1");
        assert_eq!(album.year, 2000);
        assert!(album.id().is_empty());
    }

    #[test]
    fn test_bind_body_empty_uses_instance() {
        let album = handlers().bind_body(b"  ").unwrap();
        assert_eq!(album.year, 2000);
    }

    #[test]
    fn test_bind_body_rejects_non_object() {
        let err = handlers().bind_body(b"[1,2]").unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));

        let err = handlers().bind_body(b"{not json").unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn test_check_body_id() {
        let h = handlers();
        let mut album = Album::default();
        assert!(h.check_body_id(&album, "a").is_ok());
        album.resource.id = "a".into();
        assert!(h.check_body_id(&album, "a").is_ok());
        assert!(h.check_body_id(&album, "b").is_err());
    }

    #[tokio::test]
    async fn test_patch_without_merge_is_method_not_allowed() {
        let h = handlers();
        h.storage
            .set(Album {
                resource: DefaultResource::with_id("a1"),
                title: "Album1".into(),
                year: 1999,
            })
            .await
            .unwrap();

        let ctx = RequestContext::new(Method::PATCH, Uri::from_static("/albums/a1"))
            .with_param("albums_id", "a1");
        let err = h
            .patch(ctx, Bytes::from_static(br#"{"title":"New"}"#))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_put_preserves_created_at() {
        let h = handlers();
        let ctx = RequestContext::new(Method::PUT, Uri::from_static("/albums/a1"))
            .with_param("albums_id", "a1");

        h.put(ctx.clone(), Bytes::from_static(br#"{"title":"One"}"#))
            .await
            .unwrap();
        let first = h.storage.get("a1").await.unwrap();

        h.put(ctx, Bytes::from_static(br#"{"title":"One"}"#))
            .await
            .unwrap();
        let second = h.storage.get("a1").await.unwrap();

        assert_eq!(first.resource.created_at, second.resource.created_at);
        assert_eq!(second.title, "One");
    }

    #[tokio::test]
    async fn test_post_rejects_existing_id() {
        let h = handlers();
        let ctx = RequestContext::new(Method::POST, Uri::from_static("/albums"));

        h.post(ctx.clone(), Bytes::from_static(br#"{"id":"a1","title":"One"}"#))
            .await
            .unwrap();
        let first = h.storage.get("a1").await.unwrap();

        let err = h
            .post(ctx, Bytes::from_static(br#"{"id":"a1","title":"Two"}"#))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let stored = h.storage.get("a1").await.unwrap();
        assert_eq!(stored.title, "One");
        assert_eq!(stored.resource.created_at, first.resource.created_at);
    }

    #[tokio::test]
    async fn test_hook_cannot_change_identity() {
        let mut h = handlers();
        h.hooks.on_create_or_update = Arc::new(|_: &RequestContext, album: &mut Album| -> ApiResult<()> {
            album.resource.id = "moved".into();
            album.resource.created_at = None;
            album.title = "Hooked".into();
            Ok(())
        });

        let post_ctx = RequestContext::new(Method::POST, Uri::from_static("/albums"));
        h.post(post_ctx, Bytes::from_static(br#"{"id":"a1"}"#))
            .await
            .unwrap();

        let put_ctx = RequestContext::new(Method::PUT, Uri::from_static("/albums/a2"))
            .with_param("albums_id", "a2");
        h.put(put_ctx, Bytes::from_static(br#"{"title":"Two"}"#))
            .await
            .unwrap();

        assert!(h.storage.get("moved").await.is_err());
        for id in ["a1", "a2"] {
            let stored = h.storage.get(id).await.unwrap();
            assert_eq!(stored.title, "Hooked");
            assert!(stored.resource.created_at.is_some());
        }
    }

    #[test]
    fn test_operation_methods() {
        assert_eq!(Operation::GetAll.method(), Method::GET);
        assert!(!Operation::GetAll.on_item());
        assert!(!Operation::Post.on_item());
        assert!(Operation::Get.on_item());
        assert_eq!(Operation::Patch.method(), Method::PATCH);
    }
}
