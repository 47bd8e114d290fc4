//! Resource contract implemented by every type exposed through an [`Api`](crate::api::Api)

use crate::core::context::RequestContext;
use crate::core::error::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Generate a new random resource ID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Identity shared by every resource
///
/// Embed it with `#[serde(flatten)]` so `id` and `created_at` appear at the
/// top level of the JSON representation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultResource {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl DefaultResource {
    /// A freshly identified resource, created now
    pub fn new() -> Self {
        Self {
            id: new_id(),
            created_at: Some(Utc::now()),
        }
    }

    /// An identity with a fixed ID and no creation timestamp yet
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

/// Outgoing representation hook
///
/// Runs once per response, after storage succeeded and before serialization.
pub trait Render: Serialize + Send + 'static {
    /// Redact or compute display fields
    fn render(&mut self, _ctx: &RequestContext) -> ApiResult<()> {
        Ok(())
    }

    /// HTML representation, used when the client prefers `text/html`
    fn html(&self, _ctx: &RequestContext) -> Option<String> {
        None
    }
}

/// A type that can be served as a CRUD resource
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Default, Serialize, Deserialize)]
/// struct Album {
///     #[serde(flatten)]
///     resource: DefaultResource,
///     title: String,
/// }
///
/// impl Render for Album {}
///
/// impl Resource for Album {
///     fn identity(&self) -> &DefaultResource { &self.resource }
///     fn identity_mut(&mut self) -> &mut DefaultResource { &mut self.resource }
///
///     fn patch(&mut self, partial: Self) -> ApiResult<()> {
///         if !partial.title.is_empty() {
///             self.title = partial.title;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Resource: Render + DeserializeOwned + Clone + Sync {
    fn identity(&self) -> &DefaultResource;

    fn identity_mut(&mut self) -> &mut DefaultResource;

    /// Unique identifier; empty before the resource is first stored
    fn id(&self) -> &str {
        &self.identity().id
    }

    /// Validate and normalize freshly bound request data
    ///
    /// Called for POST, PUT and PATCH with the request context, so a resource
    /// can refuse a verb with [`ApiError::MethodNotAllowed`].
    fn bind(&mut self, _ctx: &RequestContext) -> ApiResult<()> {
        Ok(())
    }

    /// Merge a bound partial update into this resource
    fn patch(&mut self, _partial: Self) -> ApiResult<()> {
        Err(ApiError::MethodNotAllowed(
            "PATCH is not supported for this resource".to_string(),
        ))
    }
}

/// Resource with no schema beyond its identity
///
/// Used by generic clients that only need to move JSON around.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnyResource {
    #[serde(flatten)]
    pub resource: DefaultResource,
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl AnyResource {
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

impl Render for AnyResource {}

impl Resource for AnyResource {
    fn identity(&self) -> &DefaultResource {
        &self.resource
    }

    fn identity_mut(&mut self) -> &mut DefaultResource {
        &mut self.resource
    }

    fn patch(&mut self, partial: Self) -> ApiResult<()> {
        self.fields.extend(partial.fields);
        Ok(())
    }
}

/// List envelope returned by the default GET-all handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceList<I> {
    pub items: Vec<I>,
}

impl<I> Default for ResourceList<I> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<I: Serialize + Send + 'static> Render for ResourceList<I> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_default_resource_has_identity() {
        let a = DefaultResource::new();
        let b = DefaultResource::new();
        assert!(!a.id().is_empty());
        assert!(a.created_at().is_some());
        assert_ne!(a.id(), b.id());
        Uuid::parse_str(a.id()).unwrap();
    }

    #[test]
    fn test_default_resource_json_shape() {
        let empty = serde_json::to_value(DefaultResource::default()).unwrap();
        assert_eq!(empty, serde_json::json!({ "id": "" }));

        let parsed: DefaultResource = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, DefaultResource::default());
    }

    #[test]
    fn test_any_resource_flattens_fields() {
        let any: AnyResource =
            serde_json::from_value(serde_json::json!({ "id": "x1", "title": "Album1" })).unwrap();
        assert_eq!(any.id(), "x1");
        assert_eq!(any.field("title"), Some(&serde_json::json!("Album1")));
        assert!(any.field("id").is_none());
    }

    #[test]
    fn test_any_resource_patch_overrides_fields() {
        let mut any: AnyResource =
            serde_json::from_value(serde_json::json!({ "id": "x1", "title": "Old", "year": 1999 }))
                .unwrap();
        let partial: AnyResource =
            serde_json::from_value(serde_json::json!({ "title": "New" })).unwrap();
        any.patch(partial).unwrap();
        assert_eq!(any.field("title"), Some(&serde_json::json!("New")));
        assert_eq!(any.field("year"), Some(&serde_json::json!(1999)));
        assert_eq!(any.id(), "x1");
    }

    #[test]
    fn test_list_envelope_shape() {
        let list = ResourceList { items: vec![1, 2] };
        assert_eq!(
            serde_json::to_value(list).unwrap(),
            serde_json::json!({ "items": [1, 2] })
        );
    }
}
