//! Typed HTTP client mirroring an API tree
//!
//! A [`Client`] is built from the same [`RoutePath`] the router is built
//! from, so every URL it requests is exactly a URL the server serves.
//!
//! ```rust,ignore
//! let artists = artist_api.client("http://localhost:8080");
//! let albums = artists.sub_client::<Album>("/albums");
//!
//! let artist = artists.post(&Artist::named("Artist1"), &[]).await?;
//! let album = albums.post(&Album::titled("Album1"), &[artist.id()]).await?;
//! ```

pub mod map;

pub use map::{ClientMap, Command, Verb};

use crate::api::ResponseCodes;
use crate::core::error::ErrorResponse;
use crate::core::path::{PathError, RoutePath};
use crate::core::resource::ResourceList;
use reqwest::header::{ACCEPT, HeaderMap};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Errors returned by [`Client`] operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A CRUD operation failed; wraps the underlying cause
    #[error("error {action}: {source}")]
    Operation {
        action: &'static str,
        #[source]
        source: Box<ClientError>,
    },

    /// The server answered with a status other than the expected one
    #[error("unexpected response with text: {text}")]
    UnexpectedResponse {
        status: StatusCode,
        text: String,
        body: String,
    },

    /// The request could not be sent or its body not read
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body is not valid JSON for the expected type
    #[error("invalid response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// A successful response that should carry a body did not
    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Path(#[from] PathError),

    /// No API with this name in the tree
    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    /// The API exists but serves a different resource type
    #[error("resource '{0}' is served with a different type")]
    TypeMismatch(String),

    /// A command could not be parsed or lacks arguments
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Two APIs in one tree share a name, so it cannot be keyed by name
    #[error("duplicate resource name '{0}'")]
    DuplicateName(String),
}

impl ClientError {
    /// HTTP status of an unexpected response, looking through operation context
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Operation { source, .. } => source.status(),
            ClientError::UnexpectedResponse { status, .. } => Some(*status),
            ClientError::Transport { source, .. } => source.status(),
            _ => None,
        }
    }

    fn during(self, action: &'static str) -> Self {
        ClientError::Operation {
            action,
            source: Box::new(self),
        }
    }
}

/// A successful HTTP exchange
#[derive(Debug, Clone)]
pub struct Response<T> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Raw response body
    pub body: String,
    /// Body decoded as JSON, `None` when the body is empty
    pub data: Option<T>,
}

/// Client for one API of a tree
///
/// Operations take the IDs of every ancestor that takes an ID, outermost
/// first, e.g. `&[artist_id, album_id]` for songs.
pub struct Client<T> {
    address: String,
    path: RoutePath,
    http: reqwest::Client,
    codes: ResponseCodes,
    _resource: PhantomData<fn() -> T>,
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            path: self.path.clone(),
            http: self.http.clone(),
            codes: self.codes.clone(),
            _resource: PhantomData,
        }
    }
}

impl<T> Client<T> {
    /// Client for the API at `path` on the server at `address`
    pub fn new(address: &str, path: RoutePath) -> Self {
        Self {
            address: address.trim_end_matches('/').to_string(),
            path,
            http: reqwest::Client::new(),
            codes: ResponseCodes::default(),
            _resource: PhantomData,
        }
    }

    /// Expect the server's custom success codes instead of the defaults
    pub fn with_response_codes(mut self, codes: ResponseCodes) -> Self {
        self.codes = codes;
        self
    }

    /// Use a preconfigured HTTP client (timeouts, default headers)
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn path(&self) -> &RoutePath {
        &self.path
    }

    /// Client for a child API mounted at `base` below this API's resource ID
    ///
    /// Shares this client's address and HTTP connection pool. Response codes
    /// reset to the defaults; set them with [`Client::with_response_codes`].
    pub fn sub_client<C>(&self, base: &str) -> Client<C> {
        let name = base.trim_matches('/');
        Client {
            address: self.address.clone(),
            path: self.path.child(name, base, true),
            http: self.http.clone(),
            codes: ResponseCodes::default(),
            _resource: PhantomData,
        }
    }

    /// Full URL of the collection, or of one resource when `id` is given
    pub fn url<S: AsRef<str>>(
        &self,
        parent_ids: &[S],
        id: Option<&str>,
    ) -> Result<String, ClientError> {
        Ok(format!("{}{}", self.address, self.path.render(parent_ids, id)?))
    }

    /// Start a request that asks for JSON
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(ACCEPT, "application/json")
    }

    /// Send a request and require `expected` as the response status
    ///
    /// Useful for custom routes; the CRUD operations are built on it.
    pub async fn make_request<D: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        expected: StatusCode,
    ) -> Result<Response<D>, ClientError> {
        let request = request.build().map_err(|source| ClientError::Transport {
            url: String::new(),
            source,
        })?;
        let url = request.url().to_string();

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        if status != expected {
            tracing::debug!(%url, %status, %expected, "unexpected response");
            return Err(unexpected_response(status, body));
        }

        let data = if body.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&body).map_err(|source| ClientError::Decode {
                url: url.clone(),
                source,
            })?)
        };

        Ok(Response {
            status,
            headers,
            body,
            data,
        })
    }

    fn expected(&self, method: &Method) -> StatusCode {
        self.codes.get(method)
    }
}

impl<T: Serialize + DeserializeOwned> Client<T> {
    /// Create a resource
    pub async fn post(&self, resource: &T, parent_ids: &[&str]) -> Result<T, ClientError> {
        self.send_resource(Method::POST, None, resource, parent_ids)
            .await
            .map_err(|e| e.during("posting resource"))
    }

    /// Fetch one resource by ID
    pub async fn get(&self, id: &str, parent_ids: &[&str]) -> Result<T, ClientError> {
        let fetch = async {
            let url = self.url(parent_ids, Some(id))?;
            let response = self
                .make_request(self.request(Method::GET, &url), self.expected(&Method::GET))
                .await?;
            require_data(response, url)
        };
        fetch.await.map_err(|e| e.during("getting resource"))
    }

    /// List resources, passing `query` as URL query parameters
    pub async fn get_all(
        &self,
        query: &[(&str, &str)],
        parent_ids: &[&str],
    ) -> Result<ResourceList<T>, ClientError> {
        let fetch = async {
            let url = self.url(parent_ids, None)?;
            let request = self.request(Method::GET, &url).query(query);
            let response = self
                .make_request(request, self.expected(&Method::GET))
                .await?;
            require_data(response, url)
        };
        fetch.await.map_err(|e| e.during("getting all resources"))
    }

    /// Create or replace the resource stored under `id`
    pub async fn put(&self, id: &str, resource: &T, parent_ids: &[&str]) -> Result<T, ClientError> {
        self.send_resource(Method::PUT, Some(id), resource, parent_ids)
            .await
            .map_err(|e| e.during("putting resource"))
    }

    /// Merge `partial` into the resource stored under `id`
    pub async fn patch<P: Serialize>(
        &self,
        id: &str,
        partial: &P,
        parent_ids: &[&str],
    ) -> Result<T, ClientError> {
        self.send_resource(Method::PATCH, Some(id), partial, parent_ids)
            .await
            .map_err(|e| e.during("patching resource"))
    }

    /// Delete the resource stored under `id`
    pub async fn delete(&self, id: &str, parent_ids: &[&str]) -> Result<(), ClientError> {
        let remove = async {
            let url = self.url(parent_ids, Some(id))?;
            self.make_request::<serde_json::Value>(
                self.request(Method::DELETE, &url),
                self.expected(&Method::DELETE),
            )
            .await?;
            Ok::<(), ClientError>(())
        };
        remove.await.map_err(|e| e.during("deleting resource"))
    }

    async fn send_resource<B: Serialize>(
        &self,
        method: Method,
        id: Option<&str>,
        body: &B,
        parent_ids: &[&str],
    ) -> Result<T, ClientError> {
        let url = self.url(parent_ids, id)?;
        let body = serde_json::to_vec(body).map_err(ClientError::Encode)?;
        let request = self
            .request(method.clone(), &url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        let response = self.make_request(request, self.expected(&method)).await?;
        require_data(response, url)
    }
}

fn require_data<D>(response: Response<D>, url: String) -> Result<D, ClientError> {
    response.data.ok_or(ClientError::EmptyBody { url })
}

/// Build an `UnexpectedResponse`, preferring the error envelope's status text
fn unexpected_response(status: StatusCode, body: String) -> ClientError {
    let text = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(envelope) => envelope.status,
        Err(_) => body.trim().to_string(),
    };
    ClientError::UnexpectedResponse { status, text, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::AnyResource;

    fn albums() -> Client<AnyResource> {
        let path = RoutePath::root()
            .child("artists", "/artists", true)
            .child("albums", "/albums", true);
        Client::new("http://localhost:8080/", path)
    }

    #[test]
    fn test_url_rendering() {
        let client = albums();
        assert_eq!(
            client.url(&["a1"], None).unwrap(),
            "http://localhost:8080/artists/a1/albums"
        );
        assert_eq!(
            client.url(&["a1"], Some("b2")).unwrap(),
            "http://localhost:8080/artists/a1/albums/b2"
        );
    }

    #[test]
    fn test_url_wrong_parent_count() {
        let err = albums().url::<&str>(&[], None).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Path(PathError {
                expected: 1,
                actual: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_sub_client_extends_path() {
        let songs = albums().sub_client::<AnyResource>("/songs");
        assert_eq!(
            songs.url(&["a1", "b2"], Some("s3")).unwrap(),
            "http://localhost:8080/artists/a1/albums/b2/songs/s3"
        );
    }

    #[test]
    fn test_unexpected_response_text() {
        let err = unexpected_response(
            StatusCode::NOT_FOUND,
            r#"{"status":"Resource not found."}"#.to_string(),
        )
        .during("getting resource");
        assert_eq!(
            err.to_string(),
            "error getting resource: unexpected response with text: Resource not found."
        );
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));

        let raw = unexpected_response(StatusCode::BAD_GATEWAY, "upstream down\n".to_string());
        assert_eq!(raw.to_string(), "unexpected response with text: upstream down");
    }
}
