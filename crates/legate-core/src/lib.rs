pub mod assistant;
pub mod conversation;
pub mod error;
pub mod registry;
pub mod runner;

pub use assistant::{delete_by_name, get_or_create, AssistantParams, DEFAULT_MODEL};
pub use conversation::{Conversation, ConversationBuilder, DEFAULT_ASSISTANT_NAME};
pub use error::{Error, Result};
pub use registry::{FunctionDefinition, FunctionHandler, FunctionRegistry};
pub use runner::{RunDriver, RunState, DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL};

// Re-export the wire types conversations hand back to callers
pub use legate_openai::{Assistant, Message, MessageContent, Role, Run, Thread};
