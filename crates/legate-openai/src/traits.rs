use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::{
    Assistant, AssistantDeleted, CreateAssistantRequest, Message, Role, Run,
    Thread, ToolOutput,
};

/// Operations of the remote assistants service consumed by the conversation
/// layer.
///
/// `OpenAIClient` is the production implementation; test suites substitute
/// scripted fakes. Implementations do not retry: transient transport errors
/// and logical API errors both surface as `ApiError`.
#[async_trait]
pub trait AssistantsClient: Send + Sync {
    async fn create_thread(&self) -> Result<Thread, ApiError>;

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, ApiError>;

    /// Full message history, most-recent-first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, ApiError>;

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, ApiError>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, ApiError>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError>;

    /// Resolve a `requires_action` run by reporting every requested tool
    /// call's output in one batch.
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<Run, ApiError>;

    async fn list_assistants(&self, limit: u32) -> Result<Vec<Assistant>, ApiError>;

    async fn create_assistant(
        &self,
        request: &CreateAssistantRequest,
    ) -> Result<Assistant, ApiError>;

    async fn delete_assistant(&self, assistant_id: &str) -> Result<AssistantDeleted, ApiError>;
}
