//! HTTP client for the ComfyUI API.
//!
//! [`Api`] is a factory over a shared `reqwest::Client` and base url,
//! handing out one small client per endpoint. Workflow documents come from
//! [`load_workflow`]/[`fetch_workflow`]; the flattening into an execution
//! payload lives in [`comfy_graph`], and [`poll::wait_for_completion`]
//! watches a submitted job to completion.

use std::path::Path;

use anyhow::Context;
use comfy_graph::WorkflowDocument;
use reqwest::Url;

pub mod api;
pub mod models;
pub mod poll;

pub use api::{HistoryApi, PromptApi, QueueApi, UploadApi, ViewApi, ViewQuery};
pub use models::{
    FileInfo, NodeOutput, OutputFile, OutputKind, QueuePosition, QueueResponse, QueueStatus, Task,
    TaskStatus,
};
pub use poll::{wait_for_completion, JobStatus};

/// Struct representing a connection to a ComfyUI server.
#[derive(Clone, Debug)]
pub struct Api {
    client: reqwest::Client,
    url: Url,
    client_id: uuid::Uuid,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            url: Url::parse("http://localhost:8188").expect("Failed to parse default URL"),
            client_id: uuid::Uuid::new_v4(),
        }
    }
}

impl Api {
    /// Returns a new `Api` instance with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new `Api` instance with the given URL as a string value.
    ///
    /// # Arguments
    ///
    /// * `url` - A string that specifies the ComfyUI API URL endpoint.
    ///
    /// # Errors
    ///
    /// If the URL fails to parse, an error will be returned.
    pub fn new_with_url<S>(url: S) -> anyhow::Result<Self>
    where
        S: AsRef<str>,
    {
        Ok(Self {
            url: Url::parse(url.as_ref()).context("Failed to parse URL")?,
            ..Default::default()
        })
    }

    /// Returns a new `Api` instance with the given `reqwest::Client` and URL as a string value.
    ///
    /// # Arguments
    ///
    /// * `client` - An instance of `reqwest::Client`.
    /// * `url` - A string that specifies the ComfyUI API URL endpoint.
    ///
    /// # Errors
    ///
    /// If the URL fails to parse, an error will be returned.
    pub fn new_with_client_and_url<S>(client: reqwest::Client, url: S) -> anyhow::Result<Self>
    where
        S: AsRef<str>,
    {
        Ok(Self {
            client,
            url: Url::parse(url.as_ref()).context("Failed to parse URL")?,
            ..Default::default()
        })
    }

    pub fn prompt(&self) -> anyhow::Result<PromptApi> {
        Ok(PromptApi::new_with_url(
            self.client.clone(),
            self.url
                .join("prompt")
                .context("Failed to parse prompt endpoint")?,
            self.client_id,
        ))
    }

    pub fn history(&self) -> anyhow::Result<HistoryApi> {
        Ok(HistoryApi::new_with_url(
            self.client.clone(),
            // Trailing slash so prompt ids join as path segments.
            self.url
                .join("history/")
                .context("Failed to parse history endpoint")?,
        ))
    }

    pub fn queue(&self) -> anyhow::Result<QueueApi> {
        Ok(QueueApi::new_with_url(
            self.client.clone(),
            self.url
                .join("queue")
                .context("Failed to parse queue endpoint")?,
        ))
    }

    pub fn view(&self) -> anyhow::Result<ViewApi> {
        Ok(ViewApi::new_with_url(
            self.client.clone(),
            self.url
                .join("view")
                .context("Failed to parse view endpoint")?,
        ))
    }

    pub fn upload(&self) -> anyhow::Result<UploadApi> {
        Ok(UploadApi::new_with_url(
            self.client.clone(),
            self.url
                .join("upload/image")
                .context("Failed to parse upload endpoint")?,
        ))
    }
}

/// Loads a workflow document from a JSON file.
///
/// # Arguments
///
/// * `path` - Path to the workflow JSON.
///
/// # Errors
///
/// If the file cannot be read or does not parse as a workflow document, an
/// error will be returned.
pub fn load_workflow<P: AsRef<Path>>(path: P) -> anyhow::Result<WorkflowDocument> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read workflow from {}", path.display()))?;
    WorkflowDocument::from_json(&json)
        .with_context(|| format!("failed to parse workflow from {}", path.display()))
}

/// Fetches a workflow document from a caller-supplied URL.
///
/// # Arguments
///
/// * `client` - A `reqwest::Client` used to send the request.
/// * `url` - The URL serving the workflow JSON.
///
/// # Errors
///
/// If the request fails or the body does not parse as a workflow document,
/// an error will be returned.
pub async fn fetch_workflow(
    client: &reqwest::Client,
    url: &str,
) -> anyhow::Result<WorkflowDocument> {
    let value: serde_json::Value = client
        .get(url)
        .send()
        .await
        .context("failed to send request")?
        .error_for_status()
        .context("workflow fetch returned an error status")?
        .json()
        .await
        .context("failed to parse json")?;
    WorkflowDocument::from_value(value).context("failed to parse workflow document")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls_derive_from_the_base() {
        let api = Api::new_with_url("http://node.example:8188/").unwrap();
        // Each accessor parses; construction is the only fallible part.
        assert!(api.prompt().is_ok());
        assert!(api.history().is_ok());
        assert!(api.queue().is_ok());
        assert!(api.view().is_ok());
        assert!(api.upload().is_ok());
    }

    #[test]
    fn load_workflow_surfaces_read_failures() {
        let error = load_workflow("/nonexistent/workflow.json").unwrap_err();
        assert!(error.to_string().contains("/nonexistent/workflow.json"));
    }
}
