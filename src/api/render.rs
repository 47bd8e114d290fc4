//! Turning rendered values into HTTP responses

use crate::core::context::RequestContext;
use crate::core::error::{ApiError, ApiResult};
use crate::core::resource::Render;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

/// Output of one render pass
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Payload {
    Json(serde_json::Value),
    Html(String),
}

impl Payload {
    pub(crate) fn into_json(self) -> serde_json::Value {
        match self {
            Payload::Json(value) => value,
            Payload::Html(html) => serde_json::Value::String(html),
        }
    }

    pub(crate) fn into_response(self, status: StatusCode) -> Response {
        match self {
            Payload::Json(value) => (status, Json(value)).into_response(),
            Payload::Html(html) => (status, Html(html)).into_response(),
        }
    }
}

/// Run the render hook, then serialize
///
/// HTML is only produced when `allow_html` is set, the client asked for it and
/// the value provides it.
pub(crate) fn render_payload<R: Render>(
    mut value: R,
    ctx: &RequestContext,
    allow_html: bool,
) -> ApiResult<Payload> {
    value.render(ctx)?;

    if allow_html && ctx.accepts_html() {
        if let Some(html) = value.html(ctx) {
            return Ok(Payload::Html(html));
        }
    }

    serde_json::to_value(&value)
        .map(Payload::Json)
        .map_err(ApiError::internal)
}
