//! Job watching: a bounded polling loop over the history and queue
//! endpoints.
//!
//! This is deliberately a best-effort retry loop with a wall-clock timeout —
//! no ordering or exactly-once guarantees. Cancellation is dropping the
//! future.

use std::time::Duration;

use anyhow::bail;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::api::{HistoryApi, QueueApi};
use crate::models::{QueuePosition, Task};

/// Progress observed while waiting for a job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Waiting behind other prompts; `position` is 1-based.
    Queued { position: usize, pending: usize },
    /// Currently executing; `completed_nodes` nodes have produced output.
    Running { completed_nodes: usize },
}

/// How many consecutive queue misses to tolerate before trusting the
/// history outputs as the completion signal. The prompt briefly disappears
/// from the queue between finishing and its history entry settling.
const QUEUE_ABSENCE_THRESHOLD: u32 = 3;

/// Polls until the prompt completes, fails, or the timeout elapses.
///
/// The interval starts at 5 seconds and stretches by 5% per check, capped
/// at 8 seconds, so long renders are not hammered with requests.
///
/// # Arguments
///
/// * `history` - The history endpoint client.
/// * `queue` - The queue endpoint client.
/// * `prompt_id` - The prompt to watch.
/// * `timeout` - Wall-clock bound on the whole wait.
/// * `on_status` - Invoked with each observed progress change.
///
/// # Returns
///
/// The final history `Task` on success, or an error on execution failure or
/// timeout.
pub async fn wait_for_completion<F>(
    history: &HistoryApi,
    queue: &QueueApi,
    prompt_id: &str,
    timeout: Duration,
    mut on_status: F,
) -> anyhow::Result<Task>
where
    F: FnMut(&JobStatus),
{
    let start = Instant::now();
    let mut interval = Duration::from_secs(5);
    let mut absent_from_queue = 0u32;

    // Give the submission a moment to register before the first check.
    sleep(Duration::from_secs(1)).await;

    loop {
        if start.elapsed() > timeout {
            bail!(
                "workflow {} did not complete within {} seconds",
                prompt_id,
                timeout.as_secs()
            );
        }

        let task = match history.get_prompt(prompt_id).await {
            Ok(task) => task,
            Err(error) => {
                // The history entry may not exist yet; keep waiting.
                debug!(prompt_id, %error, "history not available yet");
                sleep(interval).await;
                continue;
            }
        };

        if let Some(message) = task.error_message() {
            bail!("workflow {} failed: {}", prompt_id, message);
        }
        if task.is_completed() {
            info!(prompt_id, "workflow completed");
            return Ok(task);
        }

        match queue.get().await {
            Ok(status) => match status.position_of(prompt_id) {
                Some(QueuePosition::Running) => {
                    absent_from_queue = 0;
                    on_status(&JobStatus::Running {
                        completed_nodes: task.outputs.len(),
                    });
                }
                Some(QueuePosition::Pending(position)) => {
                    absent_from_queue = 0;
                    debug!(prompt_id, position, "prompt still queued");
                    on_status(&JobStatus::Queued {
                        position,
                        pending: status.pending_len(),
                    });
                }
                None => {
                    absent_from_queue += 1;
                    if absent_from_queue >= QUEUE_ABSENCE_THRESHOLD && !task.outputs.is_empty() {
                        info!(prompt_id, "prompt left the queue with outputs recorded");
                        return Ok(task);
                    }
                }
            },
            Err(error) => warn!(prompt_id, %error, "queue check failed"),
        }

        sleep(interval).await;
        interval = interval.mul_f64(1.05).min(Duration::from_secs(8));
    }
}
