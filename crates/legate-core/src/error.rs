use thiserror::Error;

use legate_openai::ApiError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not resolve assistant '{name}': {reason}")]
    AssistantResolution { name: String, reason: String },

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Malformed arguments for tool call {tool_call_id}: {source}")]
    MalformedToolArguments {
        tool_call_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Invalid parameters for function '{function}': {reason}")]
    InvalidParameters { function: String, reason: String },

    #[error(transparent)]
    Handler(#[from] anyhow::Error),

    #[error("Run {run_id} ended with status '{status}'")]
    RunFailed { run_id: String, status: String },

    #[error("Run {run_id} did not settle after {polls} polls")]
    RunStalled { run_id: String, polls: u32 },

    #[error("Thread {0} has no messages")]
    NoMessages(String),

    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

pub type Result<T> = std::result::Result<T, Error>;
