//! Response envelope decoding and classification

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ApiError;
use super::task::TaskStatus;

/// Structured error entry returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseError {
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// Decoded outcome of one HTTP call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub task_id: Option<String>,
    pub task_status: Option<TaskStatus>,
    pub data: Option<Value>,
    pub errors: Vec<ResponseError>,
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    task_id: Option<String>,
    task_status: Option<String>,
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<ResponseError>>,
    metadata: Option<Map<String, Value>>,
}

impl ResponseEnvelope {
    /// Decode a raw body. An empty body is a valid envelope with no fields.
    pub fn decode(status_code: u16, body: &str) -> Result<Self, ApiError> {
        let wire = if body.trim().is_empty() {
            WireEnvelope::default()
        } else {
            serde_json::from_str::<WireEnvelope>(body).map_err(|e| {
                tracing::error!("Failed to decode response: {}, body: {}", e, body);
                ApiError::Decode(e.to_string())
            })?
        };

        Ok(Self {
            status_code,
            task_id: wire.task_id.filter(|id| !id.is_empty()),
            task_status: wire
                .task_status
                .filter(|s| !s.is_empty())
                .map(|s| TaskStatus::parse(&s)),
            data: wire.data,
            errors: wire.errors.unwrap_or_default(),
            metadata: wire.metadata,
        })
    }

    /// Decode and classify in one step. Only 2xx envelopes are returned as `Ok`.
    pub fn classify(status_code: u16, body: &str) -> Result<Self, ApiError> {
        if is_success(status_code) {
            return Self::decode(status_code, body);
        }

        // A failing status with an undecodable body still broke the contract
        let errors = match Self::decode(status_code, body) {
            Ok(envelope) => envelope.errors,
            Err(_) => Vec::new(),
        };

        if errors.is_empty() {
            tracing::warn!("HTTP {} without structured errors: {}", status_code, body);
            return Err(ApiError::ProtocolViolation {
                status: status_code,
                body: body.to_string(),
            });
        }

        tracing::warn!("HTTP {} with {} error(s)", status_code, errors.len());
        if status_code == 404 {
            Err(ApiError::NotFound { errors })
        } else {
            Err(ApiError::Remote {
                status: status_code,
                errors,
            })
        }
    }

    pub fn is_success(&self) -> bool {
        is_success(self.status_code)
    }

    /// Take the data payload, `Value::Null` when absent
    pub fn into_data(self) -> Value {
        self.data.unwrap_or(Value::Null)
    }
}

fn is_success(status_code: u16) -> bool {
    (200..300).contains(&status_code)
}

/// Data plus listing metadata (record counts, paging)
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage {
    pub data: Value,
    pub metadata: Map<String, Value>,
}

impl ListPage {
    /// `recordCount` as reported by the API, if any
    pub fn record_count(&self) -> Option<u64> {
        self.metadata.get("recordCount").and_then(Value::as_u64)
    }
}

/// Deserialize a data payload into a typed value
pub fn decode_data<T: serde::de::DeserializeOwned>(data: Value) -> Result<T, ApiError> {
    serde_json::from_value(data).map_err(|e| ApiError::Decode(e.to_string()))
}
