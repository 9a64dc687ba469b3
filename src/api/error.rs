// src/api/error.rs
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::{Body, Response, StatusCode};
use serde_json::json;

/// Per-request failure. Always turned into a response; never propagated to
/// the connection.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("no route for {0}")]
    NotFound(String),

    #[error("method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::NotFound(_) => StatusCode::NOT_FOUND,
            RouteError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            RouteError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for RouteError {
    fn from(err: serde_json::Error) -> Self {
        RouteError::Internal(err.to_string())
    }
}

impl From<RouteError> for Response<Body> {
    fn from(err: RouteError) -> Self {
        let status = err.status();
        // Internal details stay in the logs.
        let message = match &err {
            RouteError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };

        let body = json!({ "error": message }).to_string();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if matches!(err, RouteError::MethodNotAllowed(_)) {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
        }
        response
    }
}
