//! Path composition shared by the router and the client
//!
//! A [`RoutePath`] is the chain of API segments from the outermost ancestor
//! down to one API. The router renders it with `{name_id}` placeholders, the
//! client renders it with real IDs. Both go through the same composition, so
//! the two can never disagree on URL shape. Real IDs are percent-encoded, so
//! an ID may contain `/`, `?` or any other character.

use std::borrow::Cow;

/// One API in a route chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSegment {
    name: String,
    base: String,
    takes_id: bool,
}

impl RouteSegment {
    /// API name of this segment
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base path of this segment, relative to its parent
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Whether children of this segment are addressed through an ID
    pub fn takes_id(&self) -> bool {
        self.takes_id
    }

    /// Name of the URL parameter holding this segment's resource ID
    pub fn id_param(&self) -> String {
        id_param_name(&self.name)
    }
}

/// Name of the URL parameter that carries the ID for the API called `name`
pub fn id_param_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_id", sanitized)
}

/// Wrong number of ancestor IDs supplied to [`RoutePath::render`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("path for '{resource}' needs {expected} parent id(s), got {actual}")]
pub struct PathError {
    pub resource: String,
    pub expected: usize,
    pub actual: usize,
}

/// Ordered chain of API segments, outermost first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePath {
    segments: Vec<RouteSegment>,
}

impl RoutePath {
    /// An empty path (the server root)
    pub fn root() -> Self {
        Self::default()
    }

    /// Extend this path with a child segment
    pub fn child(&self, name: &str, base: &str, takes_id: bool) -> Self {
        let mut segments = self.segments.clone();
        segments.push(RouteSegment {
            name: name.to_string(),
            base: base.to_string(),
            takes_id,
        });
        Self { segments }
    }

    /// Segments, outermost first
    pub fn segments(&self) -> &[RouteSegment] {
        &self.segments
    }

    /// The last segment of the chain
    pub fn leaf(&self) -> Option<&RouteSegment> {
        self.segments.last()
    }

    /// Ancestors whose ID must appear in the path, outermost first
    pub fn id_ancestors(&self) -> impl Iterator<Item = &RouteSegment> {
        let ancestors = self.segments.len().saturating_sub(1);
        self.segments[..ancestors].iter().filter(|s| s.takes_id)
    }

    /// Render the path with concrete ancestor IDs and an optional leaf ID
    ///
    /// `parent_ids` lists one ID for every ancestor that takes an ID,
    /// outermost first. Each ID becomes exactly one percent-encoded segment.
    pub fn render<S: AsRef<str>>(
        &self,
        parent_ids: &[S],
        leaf_id: Option<&str>,
    ) -> Result<String, PathError> {
        self.compose(parent_ids, leaf_id, |id| urlencoding::encode(id))
    }

    fn compose<'a, S: AsRef<str>>(
        &self,
        parent_ids: &'a [S],
        leaf_id: Option<&'a str>,
        segment_for: impl Fn(&'a str) -> Cow<'a, str>,
    ) -> Result<String, PathError> {
        let expected = self.id_ancestors().count();
        if parent_ids.len() != expected {
            return Err(PathError {
                resource: self.leaf().map(|s| s.name.clone()).unwrap_or_default(),
                expected,
                actual: parent_ids.len(),
            });
        }

        let mut out = String::new();
        let mut ids = parent_ids.iter();
        let last = self.segments.len().saturating_sub(1);
        for (i, segment) in self.segments.iter().enumerate() {
            push_base(&mut out, &segment.base);
            let id = if i == last {
                leaf_id
            } else if segment.takes_id {
                ids.next().map(|id| id.as_ref())
            } else {
                None
            };
            if let Some(id) = id {
                out.push('/');
                out.push_str(&segment_for(id));
            }
        }

        if out.is_empty() {
            out.push('/');
        }
        Ok(out)
    }

    /// Route pattern for the collection (`/artists/{artists_id}/albums`)
    pub fn collection_pattern(&self) -> String {
        self.pattern(false)
    }

    /// Route pattern for one resource (`/artists/{artists_id}/albums/{albums_id}`)
    pub fn item_pattern(&self) -> String {
        self.pattern(true)
    }

    fn pattern(&self, with_leaf: bool) -> String {
        let placeholders: Vec<String> = self
            .id_ancestors()
            .map(|s| format!("{{{}}}", s.id_param()))
            .collect();
        let leaf = self
            .leaf()
            .filter(|_| with_leaf)
            .map(|s| format!("{{{}}}", s.id_param()));
        // Placeholder count always matches, so composing cannot fail
        self.compose(&placeholders, leaf.as_deref(), Cow::Borrowed)
            .unwrap_or_else(|_| "/".to_string())
    }
}

/// Join an absolute route prefix with a relative custom route path
pub fn join_paths(prefix: &str, path: &str) -> String {
    let mut out = prefix.trim_end_matches('/').to_string();
    push_base(&mut out, path);
    if out.is_empty() {
        out.push('/');
    }
    out
}

fn push_base(out: &mut String, base: &str) {
    let trimmed = base.trim_matches('/');
    if !trimmed.is_empty() {
        out.push('/');
        out.push_str(trimmed);
    }
}
