use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use legate_openai::{Assistant, AssistantsClient, Message, Role, Thread};
use legate_store::ThreadStore;

use crate::assistant::{self, AssistantParams};
use crate::error::{Error, Result};
use crate::registry::FunctionRegistry;
use crate::runner::{RunDriver, DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL};

pub const DEFAULT_ASSISTANT_NAME: &str = "default-assistant";

/// Fluent construction of a [`Conversation`].
pub struct ConversationBuilder {
    client: Arc<dyn AssistantsClient>,
    registry: Arc<FunctionRegistry>,
    store: Option<Arc<ThreadStore>>,
    assistant_name: String,
    params: AssistantParams,
    poll_interval: Duration,
    max_polls: u32,
}

impl ConversationBuilder {
    pub fn new(client: Arc<dyn AssistantsClient>, registry: Arc<FunctionRegistry>) -> Self {
        Self {
            client,
            registry,
            store: None,
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            params: AssistantParams::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    /// Persist message snapshots to this store after every fetch.
    pub fn with_store(mut self, store: Arc<ThreadStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_assistant_name(mut self, name: impl Into<String>) -> Self {
        self.assistant_name = name.into();
        self
    }

    /// Parameters used if the assistant has to be created.
    pub fn with_assistant_params(mut self, params: AssistantParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    /// Start a conversation on a fresh remote thread.
    pub async fn create(self) -> Result<Conversation> {
        let assistant = assistant::get_or_create(
            self.client.as_ref(),
            &self.assistant_name,
            self.params.clone(),
        )
        .await?;

        let thread = self.client.create_thread().await?;
        tracing::info!("Created thread {}", thread.id);

        Ok(self.into_conversation(assistant, thread))
    }

    /// Resume a previously created thread, loading its history.
    pub async fn resume(self, thread_id: &str) -> Result<Conversation> {
        let assistant = assistant::get_or_create(
            self.client.as_ref(),
            &self.assistant_name,
            self.params.clone(),
        )
        .await?;

        let thread = self
            .client
            .retrieve_thread(thread_id)
            .await
            .map_err(|err| {
                if err.is_not_found() {
                    Error::ThreadNotFound(thread_id.to_string())
                } else {
                    Error::Api(err)
                }
            })?;
        tracing::info!("Resumed thread {}", thread.id);

        let mut conversation = self.into_conversation(assistant, thread);
        conversation.fetch_messages().await?;
        Ok(conversation)
    }

    fn into_conversation(self, assistant: Assistant, thread: Thread) -> Conversation {
        let driver = RunDriver::new(Arc::clone(&self.client), Arc::clone(&self.registry))
            .with_interval(self.poll_interval)
            .with_max_polls(self.max_polls);

        Conversation {
            assistant,
            thread,
            messages: Vec::new(),
            client: self.client,
            store: self.store,
            driver,
        }
    }
}

/// One conversation: a remote thread, the assistant driving it, and a local
/// snapshot of its messages (most recent first).
///
/// The remote service owns the message history; the snapshot is replaced
/// wholesale on every fetch and is never the source of truth.
pub struct Conversation {
    assistant: Assistant,
    thread: Thread,
    messages: Vec<Message>,
    client: Arc<dyn AssistantsClient>,
    store: Option<Arc<ThreadStore>>,
    driver: RunDriver,
}

impl fmt::Debug for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversation")
            .field("assistant", &self.assistant)
            .field("thread", &self.thread)
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

impl Conversation {
    pub fn builder(
        client: Arc<dyn AssistantsClient>,
        registry: Arc<FunctionRegistry>,
    ) -> ConversationBuilder {
        ConversationBuilder::new(client, registry)
    }

    pub fn assistant(&self) -> &Assistant {
        &self.assistant
    }

    pub fn thread_id(&self) -> &str {
        &self.thread.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Send a user message and block until the assistant's run completes,
    /// dispatching any tool calls it requests along the way.
    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        self.client
            .create_message(&self.thread.id, Role::User, text)
            .await?;

        let run = self
            .client
            .create_run(&self.thread.id, &self.assistant.id)
            .await?;
        tracing::info!("Created run {} on thread {}", run.id, self.thread.id);

        self.driver.drive(&run).await?;
        self.fetch_messages().await?;
        Ok(())
    }

    /// Replace the local snapshot with the full remote history.
    ///
    /// When a store is attached the snapshot is persisted afterwards; a
    /// persistence failure is logged and does not fail the fetch.
    pub async fn fetch_messages(&mut self) -> Result<&[Message]> {
        self.messages = self.client.list_messages(&self.thread.id).await?;

        if let Some(store) = &self.store {
            if let Err(err) = store.record_snapshot(&self.thread.id, &self.messages).await {
                tracing::warn!("Failed to persist thread {}: {}", self.thread.id, err);
            }
        }

        Ok(&self.messages)
    }

    /// Most recent message on the thread.
    pub async fn last_message(&mut self) -> Result<Message> {
        self.fetch_messages().await?;
        self.messages
            .first()
            .cloned()
            .ok_or_else(|| Error::NoMessages(self.thread.id.clone()))
    }
}
