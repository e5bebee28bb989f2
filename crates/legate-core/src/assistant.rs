use legate_openai::{
    Assistant, AssistantTool, AssistantsClient, CreateAssistantRequest,
};

use crate::error::{Error, Result};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const ASSISTANT_PAGE_LIMIT: u32 = 100;

/// Parameters used when an assistant has to be created.
#[derive(Debug, Clone)]
pub struct AssistantParams {
    pub model: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub tools: Vec<AssistantTool>,
}

impl Default for AssistantParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            description: Some("A helpful assistant that helps you with your tasks".to_string()),
            instructions: Some("You are a helpful assistant".to_string()),
            tools: Vec::new(),
        }
    }
}

/// Find the assistant with the given name, creating it when absent.
///
/// Assistants are matched by name and never mutated after creation; `params`
/// only applies when the assistant does not exist yet.
pub async fn get_or_create(
    client: &dyn AssistantsClient,
    name: &str,
    params: AssistantParams,
) -> Result<Assistant> {
    // TODO: page past the first 100 assistants
    let assistants = client
        .list_assistants(ASSISTANT_PAGE_LIMIT)
        .await
        .map_err(|err| resolution_error(name, err))?;

    if let Some(existing) = assistants
        .into_iter()
        .find(|assistant| assistant.name.as_deref() == Some(name))
    {
        tracing::debug!("Found existing assistant '{}' ({})", name, existing.id);
        return Ok(existing);
    }

    tracing::info!("Creating assistant '{}'", name);
    let request = CreateAssistantRequest {
        name: name.to_string(),
        model: params.model,
        description: params.description,
        instructions: params.instructions,
        tools: params.tools,
    };

    client
        .create_assistant(&request)
        .await
        .map_err(|err| resolution_error(name, err))
}

/// Delete the assistant with the given name. A missing assistant is a no-op.
pub async fn delete_by_name(client: &dyn AssistantsClient, name: &str) -> Result<bool> {
    let assistants = client.list_assistants(ASSISTANT_PAGE_LIMIT).await?;

    match assistants
        .into_iter()
        .find(|assistant| assistant.name.as_deref() == Some(name))
    {
        Some(assistant) => {
            client.delete_assistant(&assistant.id).await?;
            tracing::info!("Deleted assistant '{}' ({})", name, assistant.id);
            Ok(true)
        }
        None => {
            tracing::debug!("Assistant '{}' not found, nothing to delete", name);
            Ok(false)
        }
    }
}

fn resolution_error(name: &str, err: legate_openai::ApiError) -> Error {
    Error::AssistantResolution {
        name: name.to_string(),
        reason: err.to_string(),
    }
}
