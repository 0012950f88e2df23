use anyhow::Context;
use reqwest::Url;
use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::models::FileInfo;

/// Query parameters for the `view` endpoint.
#[skip_serializing_none]
#[derive(Serialize, Debug, Clone)]
pub struct ViewQuery {
    pub filename: String,
    pub subfolder: Option<String>,
    #[serde(rename = "type")]
    pub location: Option<String>,
}

impl From<&FileInfo> for ViewQuery {
    fn from(file: &FileInfo) -> Self {
        Self {
            filename: file.filename.clone(),
            subfolder: (!file.subfolder.is_empty()).then(|| file.subfolder.clone()),
            location: file.location.clone().or_else(|| Some("output".to_string())),
        }
    }
}

/// Struct representing a connection to the ComfyUI API `view` endpoint.
#[derive(Clone, Debug)]
pub struct ViewApi {
    client: reqwest::Client,
    endpoint: Url,
}

impl ViewApi {
    /// Constructs a new `ViewApi` client with a given `reqwest::Client` and ComfyUI API
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

    /// Constructs a new `ViewApi` client with a given `reqwest::Client` and endpoint `Url`.
    pub fn new_with_url(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Downloads a generated file.
    ///
    /// # Arguments
    ///
    /// * `query` - A `ViewQuery` identifying the file to fetch.
    ///
    /// # Returns
    ///
    /// A `Result` containing the file bytes on success, or an error if the request failed.
    pub async fn get(&self, query: &ViewQuery) -> anyhow::Result<Vec<u8>> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(query)
            .send()
            .await
            .context("failed to send request")?;
        if response.status().is_success() {
            return Ok(response
                .bytes()
                .await
                .context("failed to get bytes")?
                .to_vec());
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
