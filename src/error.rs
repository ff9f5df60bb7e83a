//! Error types and failure classification for the Orchestrate client.

use serde::Deserialize;
use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, OrchestrateError>;

/// Main error type for Orchestrate operations
#[derive(Error, Debug)]
pub enum OrchestrateError {
    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// A caller-supplied argument was rejected before any I/O
    #[error("Invalid argument: {message}")]
    Validation { message: String },

    /// An operation was invoked in a state where it cannot succeed
    #[error("Invalid operation: {message}")]
    Usage { message: String },

    /// Failures reported by the service for a completed request
    #[error(transparent)]
    Request(#[from] RequestFailure),
}

impl OrchestrateError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new usage error
    pub fn usage<S: Into<String>>(message: S) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }
}

/// A non-success response mapped onto the closed failure set.
///
/// The envelope (status, request id, machine code, message) is shared by
/// every variant; `kind` carries the variant-specific payload.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("API error (status {status}): {message} [request-id: {request_id}]")]
pub struct RequestFailure {
    /// HTTP status code of the failed response
    pub status: u16,
    /// Value of the `x-orchestrate-req-id` header, empty when absent
    pub request_id: String,
    /// Machine error code from the JSON body, empty when absent
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Classified failure variant
    pub kind: FailureKind,
}

/// Closed set of server-reported failure variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// `items_not_found`: the addressed item does not exist
    NotFound { collection: String, key: String },
    /// `api_bad_request`: the request was malformed
    BadRequest,
    /// `patch_conflict`: a patch operation failed against the current state
    PatchConflict { op_path: String, op_index: u64 },
    /// Any other or missing machine code
    Generic,
}

/// JSON error envelope as sent by the service
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<ErrorDetails>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    #[serde(default)]
    items: Option<Vec<MissingItem>>,
    #[serde(default)]
    op: Option<ConflictOp>,
}

#[derive(Debug, Default, Deserialize)]
struct MissingItem {
    #[serde(default)]
    collection: String,
    #[serde(default)]
    key: String,
}

#[derive(Debug, Default, Deserialize)]
struct ConflictOp {
    #[serde(default)]
    path: String,
    #[serde(default)]
    index: u64,
}

/// Classify a non-success response into a [`RequestFailure`].
///
/// Never fails: a body that is empty or not valid JSON falls back to
/// [`FailureKind::Generic`] with the raw text as the message.
pub fn classify(status: u16, request_id: &str, body: &str) -> RequestFailure {
    let envelope = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope,
        Err(_) => {
            return RequestFailure {
                status,
                request_id: request_id.to_string(),
                code: String::new(),
                message: body.to_string(),
                kind: FailureKind::Generic,
            };
        }
    };

    let code = envelope.code.unwrap_or_default();
    let message = envelope.message.unwrap_or_else(|| body.to_string());

    let kind = match code.as_str() {
        "items_not_found" => {
            let item = envelope
                .details
                .and_then(|details| details.items)
                .and_then(|mut items| {
                    if items.is_empty() {
                        None
                    } else {
                        Some(items.remove(0))
                    }
                })
                .unwrap_or_default();

            FailureKind::NotFound {
                collection: item.collection,
                key: item.key,
            }
        }
        "api_bad_request" => FailureKind::BadRequest,
        "patch_conflict" => {
            let op = envelope
                .details
                .and_then(|details| details.op)
                .unwrap_or_default();

            FailureKind::PatchConflict {
                op_path: op.path,
                op_index: op.index,
            }
        }
        _ => FailureKind::Generic,
    };

    RequestFailure {
        status,
        request_id: request_id.to_string(),
        code,
        message,
        kind,
    }
}
