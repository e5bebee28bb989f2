pub mod assistant;
pub mod message;
pub mod run;
pub mod thread;
pub mod tool;

pub use assistant::{Assistant, AssistantDeleted, AssistantTool, CreateAssistantRequest};
pub use message::{Message, MessageContent, Role, TextContent};
pub use run::{RequiredAction, Run, SubmitToolOutputs};
pub use thread::Thread;
pub use tool::{FunctionCall, FunctionSchema, ToolCall, ToolOutput};

use serde::{Deserialize, Serialize};

/// Paged list envelope shared by the list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,

    #[serde(default)]
    pub has_more: bool,
}
