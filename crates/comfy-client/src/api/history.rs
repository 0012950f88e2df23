use anyhow::Context;
use reqwest::Url;
use serde_json::Value;

use crate::models::Task;

/// Struct representing a connection to the ComfyUI API `history` endpoint.
#[derive(Clone, Debug)]
pub struct HistoryApi {
    client: reqwest::Client,
    endpoint: Url,
}

impl HistoryApi {
    /// Constructs a new `HistoryApi` client with a given `reqwest::Client` and ComfyUI API
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

    /// Constructs a new `HistoryApi` client with a given `reqwest::Client` and endpoint `Url`.
    pub fn new_with_url(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Fetches the history entry for a prompt.
    ///
    /// The server returns either `{<prompt_id>: {...}}` or the entry
    /// directly, depending on version; both shapes are accepted.
    ///
    /// # Arguments
    ///
    /// * `prompt_id` - The prompt id to look up.
    ///
    /// # Returns
    ///
    /// A `Result` containing a `Task` on success, or an error if the request failed.
    pub async fn get_prompt(&self, prompt_id: &str) -> anyhow::Result<Task> {
        let response = self
            .client
            .get(
                self.endpoint
                    .clone()
                    .join(prompt_id)
                    .context("failed to parse url")?,
            )
            .send()
            .await
            .context("failed to send request")?;
        if response.status().is_success() {
            let body: Value = response.json().await.context("failed to parse json")?;
            return parse_task(body, prompt_id);
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

pub(crate) fn parse_task(mut body: Value, prompt_id: &str) -> anyhow::Result<Task> {
    let entry = match body.get_mut(prompt_id) {
        Some(nested) => nested.take(),
        None => body,
    };
    serde_json::from_value(entry).context("failed to parse history entry")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn nested_history_shape_is_unwrapped() {
        let task = parse_task(
            json!({
                "abc": {
                    "outputs": {"9": {"images": [{"filename": "x.png"}]}},
                    "status": {"completed": true}
                }
            }),
            "abc",
        )
        .unwrap();
        assert!(task.is_completed());
        assert_eq!(task.outputs.len(), 1);
    }

    #[test]
    fn flat_history_shape_parses_directly() {
        let task = parse_task(
            json!({"outputs": {}, "status": {"status_str": "error", "messages": []}}),
            "abc",
        )
        .unwrap();
        assert!(task.is_errored());
    }

    #[test]
    fn empty_history_is_a_pending_task() {
        let task = parse_task(json!({}), "abc").unwrap();
        assert!(!task.is_completed());
        assert!(task.outputs.is_empty());
    }
}
