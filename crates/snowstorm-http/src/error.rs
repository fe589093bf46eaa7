use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use core::num::ParseIntError;
use serde::Serialize;
use snowstorm::BoxError;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors raised by [`HttpSource`](crate::HttpSource).
///
/// Everything except the constructor variants is transient: inside a
/// [`Pool`](snowstorm::Pool) it is logged and retried.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("at least one host is required")]
    NoHosts,

    #[error("invalid host {host:?}: {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("failed to build request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("failed to read response body: {0}")]
    Body(#[source] axum::Error),

    #[error("peer responded {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("failed to decode ids: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("expected {expected} ids, received {received}")]
    Count { expected: usize, received: usize },
}

impl From<Error> for snowstorm::Error {
    fn from(err: Error) -> Self {
        Self::fetch(err)
    }
}

/// A rejected id request. Rendered as `400 {"error": "<message>"}`.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidCount(#[from] ParseIntError),

    #[error("exceeded the maximum number per request, {max}")]
    TooMany { max: usize },

    #[error("{0}")]
    Query(#[from] axum::extract::rejection::QueryRejection),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!("Rejected id request: {self}");
        let body = ErrorBody {
            error: self.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}
