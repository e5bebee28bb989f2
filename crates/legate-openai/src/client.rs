// Assistants API client implementation

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use async_trait::async_trait;

use crate::error::ApiError;
use crate::traits::AssistantsClient;
use crate::types::{
    Assistant, AssistantDeleted, CreateAssistantRequest, ListResponse, Message,
    Role, Run, Thread, ToolOutput,
};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// How many messages a single history fetch asks for. The service pages;
/// conversations driven from a terminal stay well under one page.
const MESSAGE_PAGE_LIMIT: u32 = 100;

/// Assistants client (HTTP direct, no SDK)
pub struct OpenAIClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenAIClient {
    /// Create new client with API key
    pub fn new(api_key: impl Into<String>) -> Result<Self, ApiError> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))?,
        );
        // Assistants endpoints are gated behind the beta header.
        headers.insert("OpenAI-Beta", HeaderValue::from_static("assistants=v2"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            base_url: OPENAI_API_BASE.to_string(),
        })
    }

    /// Point the client at a different endpoint (tests, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .http_client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ApiError> {
        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .http_client
            .delete(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Pull the message out of the service's error envelope, falling back to the
/// raw body when it is not the expected shape.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorBody,
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl AssistantsClient for OpenAIClient {
    async fn create_thread(&self) -> Result<Thread, ApiError> {
        self.post("/threads", &json!({})).await
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, ApiError> {
        self.get(&format!("/threads/{}", thread_id)).await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, ApiError> {
        let page: ListResponse<Message> = self
            .get(&format!(
                "/threads/{}/messages?limit={}",
                thread_id, MESSAGE_PAGE_LIMIT
            ))
            .await?;
        Ok(page.data)
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, ApiError> {
        self.post(
            &format!("/threads/{}/messages", thread_id),
            &json!({ "role": role, "content": content }),
        )
        .await
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, ApiError> {
        self.post(
            &format!("/threads/{}/runs", thread_id),
            &json!({ "assistant_id": assistant_id }),
        )
        .await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ApiError> {
        self.get(&format!("/threads/{}/runs/{}", thread_id, run_id))
            .await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<Run, ApiError> {
        self.post(
            &format!("/threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id),
            &json!({ "tool_outputs": outputs }),
        )
        .await
    }

    async fn list_assistants(&self, limit: u32) -> Result<Vec<Assistant>, ApiError> {
        let page: ListResponse<Assistant> =
            self.get(&format!("/assistants?limit={}", limit)).await?;
        Ok(page.data)
    }

    async fn create_assistant(
        &self,
        request: &CreateAssistantRequest,
    ) -> Result<Assistant, ApiError> {
        self.post("/assistants", &serde_json::to_value(request)?)
            .await
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<AssistantDeleted, ApiError> {
        self.delete(&format!("/assistants/{}", assistant_id)).await
    }
}
