use anyhow::Context;
use reqwest::Url;

use crate::models::QueueStatus;

/// Struct representing a connection to the ComfyUI API `queue` endpoint.
#[derive(Clone, Debug)]
pub struct QueueApi {
    client: reqwest::Client,
    endpoint: Url,
}

impl QueueApi {
    /// Constructs a new `QueueApi` client with a given `reqwest::Client` and ComfyUI API
    /// endpoint `String`.
    ///
    /// # Arguments
    ///
    /// * `client` - A `reqwest::Client` used to send requests.
    /// * `endpoint` - A `String` representation of the endpoint url.
    ///
    /// # Errors
    ///
    /// If the URL fails to parse, an error will be returned.
    pub fn new(client: reqwest::Client, endpoint: String) -> anyhow::Result<Self> {
        Ok(Self::new_with_url(
            client,
            Url::parse(&endpoint).context("failed to parse endpoint url")?,
        ))
    }

    /// Constructs a new `QueueApi` client with a given `reqwest::Client` and endpoint `Url`.
    pub fn new_with_url(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Fetches the current execution queue.
    ///
    /// # Returns
    ///
    /// A `Result` containing a `QueueStatus` on success, or an error if the request failed.
    pub async fn get(&self) -> anyhow::Result<QueueStatus> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .context("failed to send request")?;
        if response.status().is_success() {
            return response.json().await.context("failed to parse json");
        }
        let status = response.status();
        let text = response
            .text()
            .await
            .context("failed to get response text")?;
        Err(anyhow::anyhow!(
            "got error code: {}, message text: {}",
            status,
            text
        ))
    }
}
