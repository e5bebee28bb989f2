use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use legate_core::{
    delete_by_name, get_or_create, AssistantParams, Conversation, ConversationBuilder, Error,
    FunctionDefinition, FunctionHandler, FunctionRegistry, RunDriver,
};
use legate_openai::{
    ApiError, Assistant, AssistantDeleted, AssistantTool, AssistantsClient,
    CreateAssistantRequest, FunctionCall, FunctionSchema, Message, MessageContent,
    RequiredAction, Role, Run, SubmitToolOutputs, Thread, ToolCall, ToolOutput,
};
use legate_store::ThreadStore;

/// Scripted stand-in for the remote service. `retrieve_run` pops the next
/// status from the script; the last status repeats forever.
struct ScriptedClient {
    statuses: Mutex<VecDeque<String>>,
    tool_calls: Mutex<Vec<ToolCall>>,
    messages: Mutex<Vec<Message>>,
    assistants: Mutex<Vec<Assistant>>,
    known_threads: Mutex<Vec<String>>,
    final_reply: Mutex<Option<String>>,
    retrieve_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    submitted_batches: Mutex<Vec<Vec<ToolOutput>>>,
    assistants_created: AtomicUsize,
    message_seq: AtomicUsize,
}

impl ScriptedClient {
    fn new(statuses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(statuses.iter().map(|s| s.to_string()).collect()),
            tool_calls: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            assistants: Mutex::new(Vec::new()),
            known_threads: Mutex::new(Vec::new()),
            final_reply: Mutex::new(None),
            retrieve_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            submitted_batches: Mutex::new(Vec::new()),
            assistants_created: AtomicUsize::new(0),
            message_seq: AtomicUsize::new(0),
        })
    }

    /// Attach a tool call to every `requires_action` run this client returns.
    fn script_tool_call(&self, id: &str, name: &str, arguments: &str) {
        self.tool_calls.lock().unwrap().push(ToolCall {
            id: id.to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        });
    }

    /// Assistant message appended once the run reaches `completed`.
    fn script_reply(&self, text: &str) {
        *self.final_reply.lock().unwrap() = Some(text.to_string());
    }

    fn seed_assistant(&self, id: &str, name: &str) {
        self.assistants.lock().unwrap().push(Assistant {
            id: id.to_string(),
            name: Some(name.to_string()),
            model: "gpt-4o-mini".to_string(),
            description: None,
            instructions: None,
            tools: Vec::new(),
        });
    }

    fn seed_thread(&self, id: &str) {
        self.known_threads.lock().unwrap().push(id.to_string());
    }

    fn seed_message(&self, text: &str) {
        self.push_message(Role::Assistant, text);
    }

    fn push_message(&self, role: Role, text: &str) -> Message {
        let seq = self.message_seq.fetch_add(1, Ordering::SeqCst);
        let message = Message {
            id: format!("msg_{}", seq),
            role,
            created_at: seq as i64,
            content: vec![MessageContent::text(text)],
        };
        self.messages.lock().unwrap().insert(0, message.clone());
        message
    }

    fn next_status(&self) -> String {
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap()
        } else {
            statuses
                .front()
                .cloned()
                .unwrap_or_else(|| "completed".to_string())
        }
    }

    fn make_run(&self, thread_id: &str, run_id: &str, status: &str) -> Run {
        let required_action = if status == "requires_action" {
            Some(RequiredAction {
                action_type: "submit_tool_outputs".to_string(),
                submit_tool_outputs: SubmitToolOutputs {
                    tool_calls: self.tool_calls.lock().unwrap().clone(),
                },
            })
        } else {
            None
        };

        Run {
            id: run_id.to_string(),
            thread_id: thread_id.to_string(),
            assistant_id: "asst_test".to_string(),
            status: status.to_string(),
            required_action,
        }
    }

    fn retrieves(&self) -> usize {
        self.retrieve_calls.load(Ordering::SeqCst)
    }

    fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssistantsClient for ScriptedClient {
    async fn create_thread(&self) -> Result<Thread, ApiError> {
        let thread = Thread {
            id: "thread_test".to_string(),
            created_at: 0,
        };
        self.known_threads.lock().unwrap().push(thread.id.clone());
        Ok(thread)
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, ApiError> {
        if self
            .known_threads
            .lock()
            .unwrap()
            .iter()
            .any(|known| known == thread_id)
        {
            Ok(Thread {
                id: thread_id.to_string(),
                created_at: 0,
            })
        } else {
            Err(ApiError::Api {
                status: 404,
                message: format!("No thread found with id '{}'.", thread_id),
            })
        }
    }

    async fn list_messages(&self, _thread_id: &str) -> Result<Vec<Message>, ApiError> {
        Ok(self.messages.lock().unwrap().clone())
    }

    async fn create_message(
        &self,
        _thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, ApiError> {
        Ok(self.push_message(role, content))
    }

    async fn create_run(&self, thread_id: &str, _assistant_id: &str) -> Result<Run, ApiError> {
        Ok(self.make_run(thread_id, "run_test", "queued"))
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        let status = self.next_status();
        if status == "completed" {
            if let Some(reply) = self.final_reply.lock().unwrap().take() {
                self.push_message(Role::Assistant, &reply);
            }
        }
        Ok(self.make_run(thread_id, run_id, &status))
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<Run, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted_batches.lock().unwrap().push(outputs);
        Ok(self.make_run(thread_id, run_id, "queued"))
    }

    async fn list_assistants(&self, _limit: u32) -> Result<Vec<Assistant>, ApiError> {
        Ok(self.assistants.lock().unwrap().clone())
    }

    async fn create_assistant(
        &self,
        request: &CreateAssistantRequest,
    ) -> Result<Assistant, ApiError> {
        self.assistants_created.fetch_add(1, Ordering::SeqCst);
        let assistant = Assistant {
            id: "asst_test".to_string(),
            name: Some(request.name.clone()),
            model: request.model.clone(),
            description: request.description.clone(),
            instructions: request.instructions.clone(),
            tools: request.tools.clone(),
        };
        self.assistants.lock().unwrap().push(assistant.clone());
        Ok(assistant)
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<AssistantDeleted, ApiError> {
        self.assistants
            .lock()
            .unwrap()
            .retain(|assistant| assistant.id != assistant_id);
        Ok(AssistantDeleted {
            id: assistant_id.to_string(),
            deleted: true,
        })
    }
}

struct AddHandler;

#[async_trait]
impl FunctionHandler for AddHandler {
    async fn call(&self, params: Value) -> anyhow::Result<Value> {
        let a = params["a"].as_i64().unwrap_or(0);
        let b = params["b"].as_i64().unwrap_or(0);
        Ok(json!(a + b))
    }
}

struct SumObjectHandler;

#[async_trait]
impl FunctionHandler for SumObjectHandler {
    async fn call(&self, params: Value) -> anyhow::Result<Value> {
        let a = params["a"].as_i64().unwrap_or(0);
        let b = params["b"].as_i64().unwrap_or(0);
        Ok(json!({"sum": a + b}))
    }
}

struct FailingHandler;

#[async_trait]
impl FunctionHandler for FailingHandler {
    async fn call(&self, _params: Value) -> anyhow::Result<Value> {
        Err(anyhow::anyhow!("database is down"))
    }
}

fn add_schema(name: &str) -> FunctionSchema {
    FunctionSchema::new(
        name,
        "Add two integers",
        json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer"},
                "b": {"type": "integer"}
            },
            "required": ["a", "b"]
        }),
    )
}

fn registry_with_add() -> Arc<FunctionRegistry> {
    let mut registry = FunctionRegistry::new();
    registry.register(
        FunctionDefinition::new(add_schema("add"), Arc::new(AddHandler)).with_tag("default"),
    );
    Arc::new(registry)
}

fn driver_for(client: &Arc<ScriptedClient>, registry: &Arc<FunctionRegistry>) -> RunDriver {
    RunDriver::new(
        Arc::clone(client) as Arc<dyn AssistantsClient>,
        Arc::clone(registry),
    )
    .with_interval(Duration::from_millis(1))
}

fn builder_for(
    client: &Arc<ScriptedClient>,
    registry: &Arc<FunctionRegistry>,
) -> ConversationBuilder {
    Conversation::builder(
        Arc::clone(client) as Arc<dyn AssistantsClient>,
        Arc::clone(registry),
    )
    .with_poll_interval(Duration::from_millis(1))
}

// --- run driver ---

#[tokio::test]
async fn test_scripted_lifecycle_dispatches_one_batch() {
    let client = ScriptedClient::new(&[
        "queued",
        "in_progress",
        "requires_action",
        "in_progress",
        "completed",
    ]);
    client.script_tool_call("call_1", "add", r#"{"a":2,"b":2}"#);
    client.script_tool_call("call_2", "add", r#"{"a":10,"b":1}"#);
    let registry = registry_with_add();

    let run = client.make_run("thread_test", "run_test", "queued");
    let finished = driver_for(&client, &registry).drive(&run).await.unwrap();

    assert_eq!(finished.status, "completed");
    assert_eq!(client.retrieves(), 5);
    assert_eq!(client.submits(), 1);

    let batches = client.submitted_batches.lock().unwrap();
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[0][0].tool_call_id, "call_1");
    assert_eq!(batches[0][0].output, "4");
    assert_eq!(batches[0][1].tool_call_id, "call_2");
    assert_eq!(batches[0][1].output, "11");
}

#[tokio::test]
async fn test_completed_on_first_poll_never_dispatches() {
    let client = ScriptedClient::new(&["completed"]);
    let registry = registry_with_add();

    let run = client.make_run("thread_test", "run_test", "queued");
    driver_for(&client, &registry).drive(&run).await.unwrap();

    assert_eq!(client.retrieves(), 1);
    assert_eq!(client.submits(), 0);
}

#[tokio::test]
async fn test_unknown_status_fails_without_further_polling() {
    let client = ScriptedClient::new(&["cancelled"]);
    let registry = registry_with_add();

    let run = client.make_run("thread_test", "run_test", "queued");
    let err = driver_for(&client, &registry).drive(&run).await.unwrap_err();

    match err {
        Error::RunFailed { run_id, status } => {
            assert_eq!(run_id, "run_test");
            assert_eq!(status, "cancelled");
        }
        other => panic!("Expected RunFailed, got {:?}", other),
    }
    assert_eq!(client.retrieves(), 1);
    assert_eq!(client.submits(), 0);
}

#[tokio::test]
async fn test_run_stalled_after_poll_budget() {
    let client = ScriptedClient::new(&["in_progress"]);
    let registry = registry_with_add();

    let run = client.make_run("thread_test", "run_test", "queued");
    let err = driver_for(&client, &registry)
        .with_max_polls(5)
        .drive(&run)
        .await
        .unwrap_err();

    match err {
        Error::RunStalled { polls, .. } => assert_eq!(polls, 5),
        other => panic!("Expected RunStalled, got {:?}", other),
    }
    assert_eq!(client.retrieves(), 5);
}

#[tokio::test]
async fn test_malformed_arguments_abort_before_submission() {
    let client = ScriptedClient::new(&["requires_action"]);
    client.script_tool_call("call_1", "add", "{not json");
    let registry = registry_with_add();

    let run = client.make_run("thread_test", "run_test", "queued");
    let err = driver_for(&client, &registry).drive(&run).await.unwrap_err();

    match err {
        Error::MalformedToolArguments { tool_call_id, .. } => {
            assert_eq!(tool_call_id, "call_1");
        }
        other => panic!("Expected MalformedToolArguments, got {:?}", other),
    }
    assert_eq!(client.submits(), 0);
}

#[tokio::test]
async fn test_unregistered_function_aborts_drive() {
    let client = ScriptedClient::new(&["requires_action"]);
    client.script_tool_call("call_1", "ghost", "{}");
    let registry = registry_with_add();

    let run = client.make_run("thread_test", "run_test", "queued");
    let err = driver_for(&client, &registry).drive(&run).await.unwrap_err();

    assert!(matches!(err, Error::FunctionNotFound(name) if name == "ghost"));
    assert_eq!(client.submits(), 0);
}

#[tokio::test]
async fn test_handler_failure_aborts_drive() {
    let client = ScriptedClient::new(&["requires_action"]);
    client.script_tool_call("call_1", "broken", "{}");

    let mut registry = FunctionRegistry::new();
    registry.register(FunctionDefinition::new(
        FunctionSchema::new("broken", "Always fails", json!({"type": "object"})),
        Arc::new(FailingHandler),
    ));
    let registry = Arc::new(registry);

    let run = client.make_run("thread_test", "run_test", "queued");
    let err = driver_for(&client, &registry).drive(&run).await.unwrap_err();

    assert!(err.to_string().contains("database is down"));
    assert_eq!(client.submits(), 0);
}

#[tokio::test]
async fn test_object_results_submitted_as_json_text() {
    let client = ScriptedClient::new(&["requires_action", "completed"]);
    client.script_tool_call("call_1", "sum", r#"{"a":2,"b":2}"#);

    let mut registry = FunctionRegistry::new();
    registry.register(FunctionDefinition::new(
        add_schema("sum"),
        Arc::new(SumObjectHandler),
    ));
    let registry = Arc::new(registry);

    let run = client.make_run("thread_test", "run_test", "queued");
    driver_for(&client, &registry).drive(&run).await.unwrap();

    let batches = client.submitted_batches.lock().unwrap();
    assert_eq!(batches[0][0].output, r#"{"sum":4}"#);
}

// --- conversation ---

#[tokio::test]
async fn test_send_message_end_to_end() {
    let client = ScriptedClient::new(&[
        "queued",
        "in_progress",
        "requires_action",
        "in_progress",
        "completed",
    ]);
    client.script_tool_call("call_1", "add", r#"{"a":2,"b":2}"#);
    client.script_reply("2 + 2 equals 4.");
    let registry = registry_with_add();

    let mut conversation = builder_for(&client, &registry).create().await.unwrap();
    conversation.send_message("What is 2 + 2?").await.unwrap();

    assert_eq!(client.submits(), 1);
    {
        let batches = client.submitted_batches.lock().unwrap();
        assert_eq!(batches[0][0].output, "4");
    }

    let last = conversation.last_message().await.unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.text(), Some("2 + 2 equals 4."));

    // user message + assistant reply, most recent first
    assert_eq!(conversation.messages().len(), 2);
    assert_eq!(conversation.messages()[1].role, Role::User);
}

#[tokio::test]
async fn test_create_registers_default_assistant_once() {
    let client = ScriptedClient::new(&["completed"]);
    let registry = registry_with_add();

    let conversation = builder_for(&client, &registry).create().await.unwrap();

    assert_eq!(client.assistants_created.load(Ordering::SeqCst), 1);
    assert_eq!(
        conversation.assistant().name.as_deref(),
        Some("default-assistant")
    );
}

#[tokio::test]
async fn test_resume_loads_history() {
    let client = ScriptedClient::new(&["completed"]);
    client.seed_thread("thread_x");
    client.seed_message("earlier reply");
    client.seed_assistant("asst_1", "default-assistant");
    let registry = registry_with_add();

    let conversation = builder_for(&client, &registry)
        .resume("thread_x")
        .await
        .unwrap();

    assert_eq!(client.assistants_created.load(Ordering::SeqCst), 0);
    assert_eq!(conversation.thread_id(), "thread_x");
    assert_eq!(conversation.messages().len(), 1);
    assert_eq!(conversation.messages()[0].text(), Some("earlier reply"));
}

#[tokio::test]
async fn test_resume_is_repeatable() {
    let client = ScriptedClient::new(&["completed"]);
    client.seed_thread("thread_x");
    client.seed_message("earlier reply");
    client.seed_assistant("asst_1", "default-assistant");
    let registry = registry_with_add();

    let first = builder_for(&client, &registry)
        .resume("thread_x")
        .await
        .unwrap();
    let second = builder_for(&client, &registry)
        .resume("thread_x")
        .await
        .unwrap();

    assert_eq!(first.messages().len(), second.messages().len());
    assert_eq!(first.messages()[0].id, second.messages()[0].id);
}

#[tokio::test]
async fn test_resume_unknown_thread() {
    let client = ScriptedClient::new(&["completed"]);
    client.seed_assistant("asst_1", "default-assistant");
    let registry = registry_with_add();

    let err = builder_for(&client, &registry)
        .resume("thread_ghost")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ThreadNotFound(id) if id == "thread_ghost"));
}

#[tokio::test]
async fn test_last_message_on_empty_thread() {
    let client = ScriptedClient::new(&["completed"]);
    let registry = registry_with_add();

    let mut conversation = builder_for(&client, &registry).create().await.unwrap();
    let err = conversation.last_message().await.unwrap_err();

    assert!(matches!(err, Error::NoMessages(_)));
}

#[tokio::test]
async fn test_snapshot_persisted_after_send() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ThreadStore::new(dir.path().join("threads.json")));

    let client = ScriptedClient::new(&["queued", "completed"]);
    client.script_reply("done");
    let registry = registry_with_add();

    let mut conversation = builder_for(&client, &registry)
        .with_store(Arc::clone(&store))
        .create()
        .await
        .unwrap();
    conversation.send_message("hello").await.unwrap();

    let record = store.load("thread_test").await.unwrap().unwrap();
    assert_eq!(record.messages.len(), 2);
    assert_eq!(
        store.most_recent_thread().await.unwrap().as_deref(),
        Some("thread_test")
    );
}

#[tokio::test]
async fn test_persistence_failure_does_not_fail_turn() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();
    // Parent of the store path is a regular file, so every save fails
    let store = Arc::new(ThreadStore::new(blocker.join("threads.json")));

    let client = ScriptedClient::new(&["completed"]);
    client.script_reply("done");
    let registry = registry_with_add();

    let mut conversation = builder_for(&client, &registry)
        .with_store(store)
        .create()
        .await
        .unwrap();

    assert!(conversation.send_message("hello").await.is_ok());
    assert_eq!(conversation.last_message().await.unwrap().text(), Some("done"));
}

// --- assistant resolution ---

#[tokio::test]
async fn test_get_or_create_reuses_existing() {
    let client = ScriptedClient::new(&["completed"]);
    client.seed_assistant("asst_1", "helper");

    let assistant = get_or_create(client.as_ref(), "helper", AssistantParams::default())
        .await
        .unwrap();

    assert_eq!(assistant.id, "asst_1");
    assert_eq!(client.assistants_created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_get_or_create_publishes_tagged_schemas() {
    let client = ScriptedClient::new(&["completed"]);
    let registry = registry_with_add();

    let params = AssistantParams {
        tools: registry
            .schemas_by_tag("default")
            .into_iter()
            .map(AssistantTool::function)
            .collect(),
        ..AssistantParams::default()
    };
    let assistant = get_or_create(client.as_ref(), "helper", params)
        .await
        .unwrap();

    assert_eq!(client.assistants_created.load(Ordering::SeqCst), 1);
    assert_eq!(assistant.tools.len(), 1);
    assert_eq!(
        assistant.tools[0].function.as_ref().unwrap().name,
        "add"
    );
}

#[tokio::test]
async fn test_delete_by_name_removes_assistant() {
    let client = ScriptedClient::new(&["completed"]);
    client.seed_assistant("asst_1", "helper");

    assert!(delete_by_name(client.as_ref(), "helper").await.unwrap());
    assert!(client.assistants.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_by_name_missing_is_noop() {
    let client = ScriptedClient::new(&["completed"]);
    assert!(!delete_by_name(client.as_ref(), "helper").await.unwrap());
}
