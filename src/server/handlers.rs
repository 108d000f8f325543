//! HTTP handlers: validate input, check the readiness gate, issue exactly
//! one store command and map the outcome to a JSON response.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, error};

use crate::error::ApiError;
use crate::store::{ConnectionState, StoreClient};

#[derive(Clone)]
pub struct AppState {
  pub store: Arc<StoreClient>,
}

/// Body of `POST /test/set` and `POST /test/lpush`
#[derive(Debug, Default, Deserialize)]
pub struct EntryRequest {
  key: Option<JsonValue>,
  value: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
  hello: &'static str,
  redis_status: ConnectionState,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
  success: bool,
  message: String,
}

#[derive(Debug, Serialize)]
pub struct ValueResponse {
  success: bool,
  key: String,
  value: String,
}

#[derive(Debug, Serialize)]
pub struct ValuesResponse {
  success: bool,
  key: String,
  values: Vec<String>,
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// JSON strings are taken verbatim, other scalars by their JSON text.
/// Missing, null and empty inputs count as absent.
fn required_text(field: Option<JsonValue>) -> Option<String> {
  let text = match field? {
    JsonValue::Null => return None,
    JsonValue::String(s) => s,
    other => other.to_string(),
  };
  (!text.is_empty()).then_some(text)
}

fn parse_entry(
  payload: Result<Json<EntryRequest>, JsonRejection>,
) -> Result<(String, String), ApiError> {
  let Json(body) = payload.map_err(|e| ApiError::Validation(format!("Invalid JSON body: {}", e.body_text())))?;
  match (required_text(body.key), required_text(body.value)) {
    (Some(key), Some(value)) => Ok((key, value)),
    _ => Err(ApiError::Validation("Key and value are required".to_string())),
  }
}

fn path_params<T>(path: Result<Path<T>, PathRejection>) -> Result<T, ApiError> {
  path
    .map(|Path(params)| params)
    .map_err(|e| ApiError::Validation(e.body_text()))
}

fn parse_index(name: &str, raw: &str) -> Result<i64, ApiError> {
  raw
    .parse()
    .map_err(|_| ApiError::Validation(format!("{} must be an integer, got '{}'", name, raw)))
}

/// The readiness gate: no store call is made unless the connection is ready
fn ensure_ready(state: &AppState) -> Result<(), ApiError> {
  if state.store.is_ready() {
    Ok(())
  } else {
    debug!("Rejecting request, store is {}", state.store.status());
    Err(ApiError::NotReady)
  }
}

fn log_failure(op: &str, key: &str, e: ApiError) -> ApiError {
  if let ApiError::Store(source) = &e {
    error!("{} '{}' failed: {}", op, key, source);
  }
  e
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
  Json(StatusResponse {
    hello: "world",
    redis_status: state.store.status(),
  })
}

pub async fn set_value(
  State(state): State<AppState>,
  payload: Result<Json<EntryRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
  let (key, value) = parse_entry(payload)?;
  ensure_ready(&state)?;

  state
    .store
    .set(&key, &value)
    .await
    .map_err(|e| log_failure("SET", &key, e.into()))?;

  Ok(Json(MessageResponse {
    success: true,
    message: format!("Key '{}' set successfully", key),
  }))
}

pub async fn get_value(
  State(state): State<AppState>,
  path: Result<Path<String>, PathRejection>,
) -> ApiResult<ValueResponse> {
  let key = path_params(path)?;
  ensure_ready(&state)?;

  let value = state
    .store
    .get(&key)
    .await
    .map_err(|e| log_failure("GET", &key, e.into()))?
    .ok_or_else(|| ApiError::NotFound(format!("Key '{}' not found", key)))?;

  Ok(Json(ValueResponse {
    success: true,
    key,
    value,
  }))
}

pub async fn push_value(
  State(state): State<AppState>,
  payload: Result<Json<EntryRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
  let (key, value) = parse_entry(payload)?;
  ensure_ready(&state)?;

  let len = state
    .store
    .lpush(&key, &value)
    .await
    .map_err(|e| log_failure("LPUSH", &key, e.into()))?;

  Ok(Json(MessageResponse {
    success: true,
    message: format!("Value pushed to list '{}', length: {}", key, len),
  }))
}

pub async fn range_values(
  State(state): State<AppState>,
  path: Result<Path<(String, String, String)>, PathRejection>,
) -> ApiResult<ValuesResponse> {
  let (key, start, stop) = path_params(path)?;
  let start = parse_index("start", &start)?;
  let stop = parse_index("stop", &stop)?;
  ensure_ready(&state)?;

  let values = state
    .store
    .lrange(&key, start, stop)
    .await
    .map_err(|e| log_failure("LRANGE", &key, e.into()))?;

  Ok(Json(ValuesResponse {
    success: true,
    key,
    values,
  }))
}

pub async fn delete_key(
  State(state): State<AppState>,
  path: Result<Path<String>, PathRejection>,
) -> ApiResult<MessageResponse> {
  let key = path_params(path)?;
  ensure_ready(&state)?;

  let count = state
    .store
    .del(&key)
    .await
    .map_err(|e| log_failure("DEL", &key, e.into()))?;

  if count == 0 {
    return Err(ApiError::NotFound(format!("Key '{}' not found", key)));
  }

  Ok(Json(MessageResponse {
    success: true,
    message: format!("Key '{}' deleted, count: {}", key, count),
  }))
}

pub async fn not_found() -> ApiError {
  ApiError::NotFound("Route not found".to_string())
}

pub async fn method_not_allowed() -> ApiError {
  ApiError::MethodNotAllowed
}
