use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of a thread message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Immutable remote message record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub created_at: i64,

    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl Message {
    /// Value of the first text-typed content part, if any
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .filter(|part| part.is_text())
            .find_map(|part| part.text.as_ref().map(|t| t.value.as_str()))
    }
}

/// One content part. Text parts carry a value; everything else keeps its raw
/// fields in `rest` so a decoded snapshot re-encodes unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub content_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl MessageContent {
    /// Text part carrying the given value
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            text: Some(TextContent {
                value: value.into(),
                annotations: Vec::new(),
            }),
            rest: Map::new(),
        }
    }

    pub fn is_text(&self) -> bool {
        self.content_type == "text"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub value: String,

    #[serde(default)]
    pub annotations: Vec<Value>,
}
