use serde::{Deserialize, Serialize};
use super::tool::FunctionSchema;

/// Remote assistant record. Created once per name, then only read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    pub name: Option<String>,
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(default)]
    pub tools: Vec<AssistantTool>,
}

/// Tool attached to an assistant. Only `function` tools carry a payload this
/// client understands; other kinds decode with `function: None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantTool {
    #[serde(rename = "type")]
    pub tool_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionSchema>,
}

impl AssistantTool {
    pub fn function(schema: FunctionSchema) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: Some(schema),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAssistantRequest {
    pub name: String,
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tools: Vec<AssistantTool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantDeleted {
    pub id: String,
    pub deleted: bool,
}
