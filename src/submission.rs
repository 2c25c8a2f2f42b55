use log::{error, info};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::constants::{ATTENDANCE_PATH, SUBMIT_TIMEOUT};
use crate::error::{read_json_response, HttpFailure};
use crate::record::AttendanceRecord;

/// Why a submission to the gateway did not succeed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("{message}")]
    Remote { status: u16, message: String },
    #[error("Network error: No response from server. Please check your internet connection.")]
    Network,
    #[error("Request error: {0}")]
    Local(String),
}

impl From<HttpFailure> for SubmitError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Remote { status, body } => {
                let message = ["message", "error"]
                    .iter()
                    .find_map(|key| body.get(key).and_then(Value::as_str))
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Server error: {}", status));
                SubmitError::Remote { status, message }
            }
            HttpFailure::Network => SubmitError::Network,
            HttpFailure::Local(message) => SubmitError::Local(message),
        }
    }
}

/// Why the stored records could not be read back
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The gateway answered with its own explanation
    #[error("{0}")]
    Rejected(String),
    #[error("Failed to fetch attendance data")]
    Failed,
}

impl From<HttpFailure> for FetchError {
    fn from(failure: HttpFailure) -> Self {
        match failure.remote_message() {
            Some(message) => FetchError::Rejected(message.to_string()),
            None => FetchError::Failed,
        }
    }
}

/// Sends finished records somewhere that stores them
#[allow(async_fn_in_trait)]
pub trait Submitter {
    async fn submit(&self, record: &AttendanceRecord) -> Result<Value, SubmitError>;
}

/// Client for the gateway's attendance endpoint
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    endpoint: String,
}

impl GatewayClient {
    pub fn new(gateway_url: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(SUBMIT_TIMEOUT).build()?;
        Ok(Self::with_client(client, gateway_url))
    }

    pub fn with_client(client: Client, gateway_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", gateway_url.trim_end_matches('/'), ATTENDANCE_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Read the stored records envelope for the dashboard
    pub async fn fetch_records(&self) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(HttpFailure::from_reqwest);
        let result = match response {
            Ok(response) => read_json_response(response).await,
            Err(failure) => Err(failure),
        };
        result.map_err(|failure| {
            error!("Error fetching attendance data: {}", failure);
            FetchError::from(failure)
        })
    }
}

impl Submitter for GatewayClient {
    async fn submit(&self, record: &AttendanceRecord) -> Result<Value, SubmitError> {
        info!("Submitting attendance to {}: {:?}", self.endpoint, record.for_log());
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(record)
            .send()
            .await
            .map_err(HttpFailure::from_reqwest)?;

        let status = response.status();
        let body = read_json_response(response).await?;
        // Any other 2xx is not an acknowledgement of storage
        if status.as_u16() != 200 && status.as_u16() != 201 {
            return Err(SubmitError::Remote {
                status: status.as_u16(),
                message: format!("Server returned status {}", status.as_u16()),
            });
        }
        info!("Attendance submitted ({})", status);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_message_prefers_message_then_error() {
        let with_message = HttpFailure::Remote {
            status: 400,
            body: json!({"error": "Missing required fields", "message": "bad input"}),
        };
        assert_eq!(SubmitError::from(with_message).to_string(), "bad input");

        let with_error = HttpFailure::Remote {
            status: 400,
            body: json!({"error": "Missing required fields", "missing": ["id"]}),
        };
        assert_eq!(
            SubmitError::from(with_error).to_string(),
            "Missing required fields"
        );

        let bare = HttpFailure::Remote {
            status: 502,
            body: Value::String("Bad Gateway".into()),
        };
        assert_eq!(SubmitError::from(bare).to_string(), "Server error: 502");
    }

    #[test]
    fn test_fetch_error_uses_gateway_message() {
        let remote = HttpFailure::Remote {
            status: 503,
            body: json!({"error": "Network Error", "message": "Unable to reach remote API."}),
        };
        assert_eq!(
            FetchError::from(remote),
            FetchError::Rejected("Unable to reach remote API.".into())
        );
        assert_eq!(
            FetchError::from(HttpFailure::Network).to_string(),
            "Failed to fetch attendance data"
        );
    }

    #[test]
    fn test_endpoint_joins_path() {
        let client = GatewayClient::with_client(Client::new(), "http://localhost:3000/");
        assert_eq!(client.endpoint(), "http://localhost:3000/api/attendance");
    }
}
