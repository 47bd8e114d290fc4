//! Per-verb success status codes

use axum::http::{Method, StatusCode};
use std::collections::HashMap;

/// Status code returned by each default handler on success
///
/// The server answers with these and the client expects them, so an override
/// set on an API applies to both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCodes {
    codes: HashMap<Method, StatusCode>,
}

impl Default for ResponseCodes {
    fn default() -> Self {
        let codes = [
            (Method::GET, StatusCode::OK),
            (Method::POST, StatusCode::CREATED),
            (Method::PUT, StatusCode::OK),
            (Method::PATCH, StatusCode::OK),
            (Method::DELETE, StatusCode::OK),
        ]
        .into_iter()
        .collect();
        Self { codes }
    }
}

impl ResponseCodes {
    /// Expected status for `method`, 200 if nothing is configured
    pub fn get(&self, method: &Method) -> StatusCode {
        self.codes.get(method).copied().unwrap_or(StatusCode::OK)
    }

    pub fn set(&mut self, method: Method, status: StatusCode) {
        self.codes.insert(method, status);
    }
}
