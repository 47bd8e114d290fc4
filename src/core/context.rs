//! Request-scoped context handed to resources, hooks and custom routes

use crate::core::path::id_param_name;
use axum::extract::{FromRequestParts, Query, RawPathParams};
use axum::http::header::{ACCEPT, HeaderName};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, HeaderValue, Method, Uri};
use std::any::Any;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

/// Resources resolved for the current request, keyed by API name
///
/// Ancestor-resolution middleware fills this in as the request descends the
/// API tree. Cloning is cheap; adding an entry copies the map only when it is
/// shared.
#[derive(Clone, Default)]
pub struct ResolvedResources {
    entries: Arc<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ResolvedResources {
    /// Get the resource resolved for `name`, if it has type `R`
    pub fn get<R: Any>(&self, name: &str) -> Option<&R> {
        self.entries.get(name)?.downcast_ref::<R>()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn insert<R: Any + Send + Sync>(&mut self, name: &str, resource: R) {
        Arc::make_mut(&mut self.entries).insert(name.to_string(), Arc::new(resource));
    }

    /// Store a resolved resource in request extensions
    pub(crate) fn insert_into<R: Any + Send + Sync>(
        extensions: &mut Extensions,
        name: &str,
        resource: R,
    ) {
        let mut resolved = extensions
            .remove::<ResolvedResources>()
            .unwrap_or_default();
        resolved.insert(name, resource);
        extensions.insert(resolved);
    }

    pub(crate) fn is_resolved(extensions: &Extensions, name: &str) -> bool {
        extensions
            .get::<ResolvedResources>()
            .is_some_and(|r| r.contains(name))
    }
}

impl fmt::Debug for ResolvedResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Everything a handler or hook may read about the current request
///
/// Extract it in custom routes like any other axum extractor:
///
/// ```rust,ignore
/// async fn rsvp(ctx: RequestContext) -> Result<Json<Invite>, ApiError> {
///     let invite = ctx.resource::<Invite>("invites").ok_or(ApiError::NotFound)?;
///     Ok(Json(invite.clone()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: HashMap<String, String>,
    query: HashMap<String, String>,
    resolved: ResolvedResources,
}

impl RequestContext {
    /// Build a context by hand, mostly useful in unit tests of resources
    pub fn new(method: Method, uri: Uri) -> Self {
        let query = parse_query(&uri);
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            params: HashMap::new(),
            query,
            resolved: ResolvedResources::default(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_resource<R: Any + Send + Sync>(mut self, api_name: &str, resource: R) -> Self {
        self.resolved.insert(api_name, resource);
        self
    }

    /// Build the context from request parts, after routing has matched
    pub async fn from_parts<S: Send + Sync>(parts: &mut Parts, state: &S) -> Self {
        let params = match RawPathParams::from_request_parts(parts, state).await {
            Ok(raw) => raw
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            Err(_) => HashMap::new(),
        };

        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            params,
            query: parse_query(&parts.uri),
            resolved: parts
                .extensions
                .get::<ResolvedResources>()
                .cloned()
                .unwrap_or_default(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Query string parameter
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Raw path parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// ID from the path for the API called `api_name`
    pub fn id_param(&self, api_name: &str) -> Option<&str> {
        self.param(&id_param_name(api_name))
    }

    /// Resource resolved for the API called `api_name`
    pub fn resource<R: Any>(&self, api_name: &str) -> Option<&R> {
        self.resolved.get(api_name)
    }

    pub fn resolved(&self) -> &ResolvedResources {
        &self.resolved
    }

    /// Whether `text/html` is preferred over JSON by the `Accept` header
    pub fn accepts_html(&self) -> bool {
        let Some(accept) = self.headers.get(ACCEPT).and_then(|v| v.to_str().ok()) else {
            return false;
        };
        accept
            .split(',')
            .map(|part| part.split(';').next().unwrap_or_default().trim())
            .find(|media| *media == "text/html" || *media == "application/json")
            == Some("text/html")
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts, state).await)
    }
}

fn parse_query(uri: &Uri) -> HashMap<String, String> {
    Query::<HashMap<String, String>>::try_from_uri(uri)
        .map(|Query(q)| q)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_and_params() {
        let ctx = RequestContext::new(Method::GET, "/albums?title=Album1&x=1".parse().unwrap())
            .with_param("albums_id", "abc");
        assert_eq!(ctx.query("title"), Some("Album1"));
        assert_eq!(ctx.query("missing"), None);
        assert_eq!(ctx.id_param("albums"), Some("abc"));
        assert_eq!(ctx.param("albums_id"), Some("abc"));
    }

    #[test]
    fn test_resolved_resources_downcast() {
        let ctx = RequestContext::new(Method::GET, Uri::from_static("/"))
            .with_resource("albums", "Album1".to_string());
        assert_eq!(ctx.resource::<String>("albums").map(String::as_str), Some("Album1"));
        assert!(ctx.resource::<u32>("albums").is_none());
        assert!(ctx.resource::<String>("artists").is_none());
    }

    #[test]
    fn test_insert_into_extensions_preserves_existing() {
        let mut ext = Extensions::new();
        ResolvedResources::insert_into(&mut ext, "artists", 1u32);
        ResolvedResources::insert_into(&mut ext, "albums", 2u32);
        assert!(ResolvedResources::is_resolved(&ext, "artists"));
        assert!(ResolvedResources::is_resolved(&ext, "albums"));
        assert!(!ResolvedResources::is_resolved(&ext, "songs"));
    }

    #[test]
    fn test_clone_is_copy_on_write() {
        let mut a = ResolvedResources::default();
        a.insert("artists", 1u32);
        let mut b = a.clone();
        b.insert("albums", 2u32);
        assert!(!a.contains("albums"));
        assert!(b.contains("artists"));
    }

    #[test]
    fn test_accepts_html() {
        let html = RequestContext::new(Method::GET, Uri::from_static("/")).with_header(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9"),
        );
        assert!(html.accepts_html());

        let json = RequestContext::new(Method::GET, Uri::from_static("/"))
            .with_header(ACCEPT, HeaderValue::from_static("application/json, text/html"));
        assert!(!json.accepts_html());

        assert!(!RequestContext::new(Method::GET, Uri::from_static("/")).accepts_html());
    }

    #[tokio::test]
    async fn test_from_parts_without_route_params() {
        let (mut parts, _) = axum::http::Request::builder()
            .uri("/albums?title=a")
            .body(())
            .unwrap()
            .into_parts();
        ResolvedResources::insert_into(&mut parts.extensions, "artists", 7u32);
        let ctx = RequestContext::from_parts(&mut parts, &()).await;
        assert_eq!(ctx.query("title"), Some("a"));
        assert_eq!(ctx.resource::<u32>("artists"), Some(&7));
        assert!(ctx.param("albums_id").is_none());
    }
}
