//! Error types shared by the store client, the HTTP layer and startup.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::protocol::{ProtocolError, UnexpectedReply};

/// Failures of the store client
#[derive(Debug, Error)]
pub enum StoreError {
  /// No usable connection right now
  #[error("store connection is not ready")]
  NotReady,
  #[error("invalid store address '{address}': {reason}")]
  InvalidAddress { address: String, reason: String },
  #[error("store connection failed: {0}")]
  Io(#[from] std::io::Error),
  #[error("store closed the connection")]
  Closed,
  #[error("malformed reply from store: {0}")]
  Protocol(#[from] ProtocolError),
  /// The store answered with an error reply, e.g. WRONGTYPE
  #[error("{0}")]
  Command(String),
  #[error("{0}")]
  Unexpected(UnexpectedReply),
  #[error("store did not answer within {0:?}")]
  Timeout(Duration),
}

impl StoreError {
  /// Whether the connection that produced this error can no longer be used.
  pub fn is_connection_fault(&self) -> bool {
    matches!(
      self,
      StoreError::Io(_) | StoreError::Closed | StoreError::Protocol(_) | StoreError::Timeout(_)
    )
  }
}

impl From<UnexpectedReply> for StoreError {
  fn from(e: UnexpectedReply) -> Self {
    StoreError::Unexpected(e)
  }
}

/// Errors surfaced by the HTTP handlers. Every variant maps to a status code
/// and a JSON body with at least an `error` field.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  Validation(String),
  #[error("Redis not connected")]
  NotReady,
  #[error("{0}")]
  NotFound(String),
  #[error("Method not allowed")]
  MethodNotAllowed,
  #[error("Redis operation failed")]
  Store(StoreError),
}

impl ApiError {
  pub fn status_code(&self) -> StatusCode {
    match self {
      ApiError::Validation(_) => StatusCode::BAD_REQUEST,
      ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
      ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<StoreError> for ApiError {
  fn from(e: StoreError) -> Self {
    match e {
      // the connection dropped between the readiness check and the command
      StoreError::NotReady => ApiError::NotReady,
      other => ApiError::Store(other),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status_code();
    let body = match &self {
      ApiError::Store(source) => json!({ "error": self.to_string(), "details": source.to_string() }),
      _ => json!({ "error": self.to_string() }),
    };
    (status, Json(body)).into_response()
  }
}

/// Fatal errors while bringing the service up
#[derive(Debug, Error)]
pub enum StartupError {
  #[error("failed to bind HTTP listener on {addr}: {source}")]
  Bind {
    addr: String,
    #[source]
    source: std::io::Error,
  },
  #[error("HTTP server on {addr} terminated: {source}")]
  Serve {
    addr: SocketAddr,
    #[source]
    source: std::io::Error,
  },
  #[error(transparent)]
  Store(#[from] StoreError),
}
