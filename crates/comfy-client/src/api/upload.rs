use anyhow::Context;
use reqwest::{multipart, Url};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
struct UploadResponse {
    name: String,
}

/// Struct representing a connection to the ComfyUI API `upload/image` endpoint.
///
/// All input files go through this endpoint regardless of media type; the
/// server has no dedicated audio/video upload route.
#[derive(Clone, Debug)]
pub struct UploadApi {
    client: reqwest::Client,
    endpoint: Url,
}

impl UploadApi {
    /// Constructs a new `UploadApi` client with a given `reqwest::Client` and ComfyUI API
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

    /// Constructs a new `UploadApi` client with a given `reqwest::Client` and endpoint `Url`.
    pub fn new_with_url(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Uploads a file into the server's input store.
    ///
    /// # Arguments
    ///
    /// * `filename` - The name to store the file under.
    /// * `bytes` - The file contents.
    ///
    /// # Returns
    ///
    /// A `Result` containing the stored name on success, or an error if the
    /// request failed. The stored name is what `LoadImage`-style nodes
    /// reference.
    pub async fn upload(&self, filename: String, bytes: Vec<u8>) -> anyhow::Result<String> {
        let form = multipart::Form::new()
            .part("image", multipart::Part::bytes(bytes).file_name(filename))
            .text("type", "input");
        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .context("failed to send request")?;
        if response.status().is_success() {
            let body: UploadResponse = response.json().await.context("failed to parse json")?;
            return Ok(body.name);
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
