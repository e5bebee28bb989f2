pub mod client;
pub mod error;
pub mod traits;
pub mod types;

pub use client::OpenAIClient;
pub use error::ApiError;
pub use traits::AssistantsClient;
pub use types::{
    Assistant, AssistantDeleted, AssistantTool, CreateAssistantRequest,
    FunctionCall, FunctionSchema, ListResponse, Message, MessageContent,
    RequiredAction, Role, Run, SubmitToolOutputs, TextContent, Thread,
    ToolCall, ToolOutput,
};
