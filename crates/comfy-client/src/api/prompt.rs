use anyhow::Context;
use comfy_graph::ExecutionPayload;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::models::QueueResponse;

#[skip_serializing_none]
#[derive(Serialize, Debug)]
struct PromptWrapper<'a> {
    prompt: &'a ExecutionPayload,
    client_id: Option<uuid::Uuid>,
    extra_data: Option<&'a Value>,
}

/// Struct representing a connection to the ComfyUI API `prompt` endpoint.
#[derive(Clone, Debug)]
pub struct PromptApi {
    client: reqwest::Client,
    endpoint: Url,
    client_id: uuid::Uuid,
}

impl PromptApi {
    /// Constructs a new `PromptApi` client with a given `reqwest::Client` and ComfyUI API
    /// endpoint `String`.
    ///
    /// # Arguments
    ///
    /// * `client` - A `reqwest::Client` used to send requests.
    /// * `endpoint` - A `String` representation of the endpoint url.
    /// * `client_id` - The client id to attribute submissions to.
    ///
    /// # Errors
    ///
    /// If the URL fails to parse, an error will be returned.
    pub fn new(
        client: reqwest::Client,
        endpoint: String,
        client_id: uuid::Uuid,
    ) -> anyhow::Result<Self> {
        Ok(Self::new_with_url(
            client,
            Url::parse(&endpoint).context("failed to parse endpoint url")?,
            client_id,
        ))
    }

    /// Constructs a new `PromptApi` client with a given `reqwest::Client` and endpoint `Url`.
    pub fn new_with_url(client: reqwest::Client, endpoint: Url, client_id: uuid::Uuid) -> Self {
        Self {
            client,
            endpoint,
            client_id,
        }
    }

    /// Queues an execution payload.
    ///
    /// # Arguments
    ///
    /// * `payload` - The flattened workflow to submit.
    ///
    /// # Returns
    ///
    /// A `Result` containing a `QueueResponse` on success, or an error if the request failed.
    pub async fn send(&self, payload: &ExecutionPayload) -> anyhow::Result<QueueResponse> {
        self.send_with_extra(payload, None).await
    }

    /// Queues an execution payload, forwarding the document's `extra_data`
    /// block when the caller preserved one.
    pub async fn send_with_extra(
        &self,
        payload: &ExecutionPayload,
        extra_data: Option<&Value>,
    ) -> anyhow::Result<QueueResponse> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&PromptWrapper {
                prompt: payload,
                client_id: Some(self.client_id),
                extra_data,
            })
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
