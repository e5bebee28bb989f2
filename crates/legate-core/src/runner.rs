use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use legate_openai::{AssistantsClient, Run, ToolOutput};

use crate::error::{Error, Result};
use crate::registry::FunctionRegistry;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_POLLS: u32 = 600;

/// Lifecycle state of a remote run, classified from the wire status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Queued,
    InProgress,
    RequiresAction,
    Completed,
    /// Any status this client does not drive (`failed`, `cancelled`,
    /// `expired`, or something newer). Terminal.
    Failed(String),
}

impl RunState {
    pub fn classify(status: &str) -> Self {
        match status {
            "queued" => RunState::Queued,
            "in_progress" => RunState::InProgress,
            "requires_action" => RunState::RequiresAction,
            "completed" => RunState::Completed,
            other => RunState::Failed(other.to_string()),
        }
    }
}

/// Polls a run to completion, dispatching requested tool calls through the
/// registry.
///
/// One driver drives one run at a time; nothing here guards against a second
/// driver polling the same thread.
pub struct RunDriver {
    client: Arc<dyn AssistantsClient>,
    registry: Arc<FunctionRegistry>,
    interval: Duration,
    max_polls: u32,
}

impl RunDriver {
    pub fn new(client: Arc<dyn AssistantsClient>, registry: Arc<FunctionRegistry>) -> Self {
        Self {
            client,
            registry,
            interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    /// Drive the run until it completes.
    ///
    /// `requires_action` resolves every requested tool call and reports the
    /// whole batch in a single submission. Queued and in-progress states wait
    /// one interval. Any other status fails the drive immediately, and a run
    /// that never settles within the poll budget fails with `RunStalled`.
    pub async fn drive(&self, run: &Run) -> Result<Run> {
        let mut current = self.client.retrieve_run(&run.thread_id, &run.id).await?;
        let mut polls: u32 = 1;

        loop {
            tracing::debug!("Run {} status: {}", current.id, current.status);

            match RunState::classify(&current.status) {
                RunState::Completed => {
                    tracing::info!("Run {} completed after {} polls", current.id, polls);
                    break;
                }
                RunState::RequiresAction => {
                    let outputs = self.dispatch(&current).await?;
                    self.client
                        .submit_tool_outputs(&current.thread_id, &current.id, outputs)
                        .await?;
                }
                RunState::Queued | RunState::InProgress => {}
                RunState::Failed(status) => {
                    return Err(Error::RunFailed {
                        run_id: current.id.clone(),
                        status,
                    });
                }
            }

            if polls >= self.max_polls {
                return Err(Error::RunStalled {
                    run_id: current.id.clone(),
                    polls,
                });
            }

            current = self
                .client
                .retrieve_run(&current.thread_id, &current.id)
                .await?;
            polls += 1;
            tokio::time::sleep(self.interval).await;
        }

        Ok(current)
    }

    /// Resolve every tool call of a `requires_action` run, in the order the
    /// run listed them. Any failure abandons the batch before submission.
    async fn dispatch(&self, run: &Run) -> Result<Vec<ToolOutput>> {
        let calls = run.tool_calls();
        tracing::info!("Run {} requested {} tool calls", run.id, calls.len());

        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            let params: Value =
                call.arguments_value()
                    .map_err(|source| Error::MalformedToolArguments {
                        tool_call_id: call.id.clone(),
                        source,
                    })?;

            tracing::debug!(
                "Calling function '{}' for tool call {}",
                call.function.name,
                call.id
            );
            let result = self.registry.invoke(&call.function.name, params).await?;
            outputs.push(ToolOutput::new(call.id.clone(), output_text(result)));
        }

        Ok(outputs)
    }
}

/// String results pass through untouched; anything else is reported as its
/// JSON text.
fn output_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
