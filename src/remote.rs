use bytes::Bytes;
use log::info;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::error::{read_json_response, HttpFailure};

/// Client for the remote storage API behind the gateway.
///
/// The remote is opaque: it takes a record as JSON on POST and lists the
/// stored records on GET at the same URL.
#[derive(Debug, Clone)]
pub struct RemoteStorageClient {
    client: Client,
    url: Url,
}

impl RemoteStorageClient {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, HttpFailure> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpFailure::Local(e.to_string()))?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetch the stored collection as the remote returns it
    pub async fn list(&self) -> Result<Value, HttpFailure> {
        let response = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(HttpFailure::from_reqwest)?;
        let status = response.status();
        let body = read_json_response(response).await?;
        info!(
            "Remote GET response: status {}, items {}",
            status,
            item_count(&body)
        );
        Ok(body)
    }

    /// Forward a JSON body exactly as received
    pub async fn store(&self, body: Bytes) -> Result<Value, HttpFailure> {
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(HttpFailure::from_reqwest)?;
        let status = response.status();
        let body = read_json_response(response).await?;
        info!("Remote POST response: status {}", status);
        Ok(body)
    }
}

fn item_count(body: &Value) -> usize {
    body.pointer("/data/Items")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}
