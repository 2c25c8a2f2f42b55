use log::debug;
use serde_json::Value;
use thiserror::Error;

use crate::camera::CameraError;
use crate::capture::CaptureState;
use crate::device::PositionError;
use crate::submission::SubmitError;

/// Failure of an outbound HTTP call, classified where the call is made so
/// callers match on the variant instead of probing the error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HttpFailure {
    /// The peer answered with a non-success status
    #[error("remote responded with status {status}")]
    Remote { status: u16, body: Value },
    /// The request went out but no response came back
    #[error("no response received")]
    Network,
    /// The request could not be built or sent at all
    #[error("{0}")]
    Local(String),
}

impl HttpFailure {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return HttpFailure::Local(err.to_string());
        }
        debug!("Request failed without response: {}", err);
        HttpFailure::Network
    }

    /// The `message` field of a remote failure body, if any
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            HttpFailure::Remote { body, .. } => body.get("message").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Read a response as JSON, keeping non-JSON bodies as a string value.
/// Non-success statuses become `HttpFailure::Remote`.
pub async fn read_json_response(response: reqwest::Response) -> Result<Value, HttpFailure> {
    let status = response.status();
    let text = response.text().await.map_err(HttpFailure::from_reqwest)?;
    let body = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };

    if status.is_success() {
        Ok(body)
    } else {
        Err(HttpFailure::Remote {
            status: status.as_u16(),
            body,
        })
    }
}

/// User-facing failures of the check-in workflow. The message is what the
/// user sees inline; none of these are retried automatically.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    #[error("{0}")]
    Permission(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Timeout(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Network(String),
    #[error("{0}")]
    Remote(String),
    /// The operation is not reachable from the current state; nothing changed
    #[error("operation not available in state {0:?}")]
    InvalidState(CaptureState),
}

impl From<PositionError> for CaptureError {
    fn from(err: PositionError) -> Self {
        let message = err.to_string();
        match err {
            PositionError::PermissionDenied => CaptureError::Permission(message),
            PositionError::Timeout => CaptureError::Timeout(message),
            PositionError::PositionUnavailable
            | PositionError::Unknown
            | PositionError::Unsupported => CaptureError::Unavailable(message),
        }
    }
}

impl From<CameraError> for CaptureError {
    fn from(err: CameraError) -> Self {
        match err {
            CameraError::PermissionDenied => CaptureError::Permission(
                "Camera access denied. Please allow camera permissions.".to_string(),
            ),
            CameraError::NotFound => {
                CaptureError::Unavailable("No camera device found.".to_string())
            }
            CameraError::NotReady => CaptureError::Unavailable("Camera not ready".to_string()),
            CameraError::Frame(_) => {
                CaptureError::Unavailable("Failed to capture image".to_string())
            }
        }
    }
}

impl From<SubmitError> for CaptureError {
    fn from(err: SubmitError) -> Self {
        let message = err.to_string();
        match err {
            SubmitError::Remote { .. } => CaptureError::Remote(message),
            SubmitError::Network | SubmitError::Local(_) => CaptureError::Network(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_position_errors_keep_distinct_messages() {
        let errors = [
            PositionError::PermissionDenied,
            PositionError::PositionUnavailable,
            PositionError::Timeout,
            PositionError::Unknown,
        ];
        let messages: Vec<String> = errors
            .into_iter()
            .map(|e| CaptureError::from(e).to_string())
            .collect();
        for (i, a) in messages.iter().enumerate() {
            assert!(!a.is_empty());
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_remote_message_only_for_remote_failures() {
        let failure = HttpFailure::Remote {
            status: 502,
            body: json!({"message": "upstream down"}),
        };
        assert_eq!(failure.remote_message(), Some("upstream down"));
        assert_eq!(HttpFailure::Network.remote_message(), None);
    }
}
