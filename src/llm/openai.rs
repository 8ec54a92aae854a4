// OpenAI adapter
// Chat Completions for the stateless path, Assistants v2 for the attachment workflow.
// API Reference: https://platform.openai.com/docs/api-reference

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Body, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::llm::provider::{
    Assistant, AssistantSpec, AssistantsApi, LLMAdapter, Run, Thread, ThreadMessage, UploadedFile,
};
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest, LLMResponse, TokenUsage};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const ASSISTANTS_BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");
const LIST_PAGE_SIZE: &str = "100";

pub struct OpenAIAdapter {
    client: Client,
    api_key: String,
    api_base: String,
}

// Chat Completions
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [LLMMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// Assistants v2
#[derive(Serialize)]
struct ToolSpec {
    #[serde(rename = "type")]
    tool_type: &'static str,
}

const CODE_INTERPRETER: ToolSpec = ToolSpec { tool_type: "code_interpreter" };

#[derive(Serialize)]
struct AssistantBody<'a> {
    name: &'a str,
    instructions: &'a str,
    model: &'a str,
    tools: [ToolSpec; 1],
}

#[derive(Serialize)]
struct MessageBody<'a> {
    role: &'static str,
    content: &'a str,
    attachments: [Attachment<'a>; 1],
}

#[derive(Serialize)]
struct Attachment<'a> {
    file_id: &'a str,
    tools: [ToolSpec; 1],
}

#[derive(Serialize)]
struct RunBody<'a> {
    assistant_id: &'a str,
}

#[derive(Deserialize)]
struct ListPage<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Deserialize)]
struct OpenAIError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl OpenAIAdapter {
    /// Create an adapter against a custom base URL (proxies, compatible gateways, tests)
    pub fn new_with_api_base(api_key: &str, api_base: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &crate::config::LLMConfig) -> AppResult<Option<Self>> {
        match config.active_api_key() {
            Some(key) => Self::new_with_api_base(
                &key,
                &config.openai_base_url,
                Duration::from_secs(config.request_timeout_secs),
            )
            .map(Some),
            None => Ok(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.api_key)
    }

    fn beta(&self, builder: RequestBuilder) -> RequestBuilder {
        self.authorized(builder)
            .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1)
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder, context: &str) -> AppResult<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::LLMApi(format!("{} request failed: {}", context, e)))?;

        let response = Self::check_status(response, context).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::LLMApi(format!("Failed to parse {} response: {}", context, e)))
    }

    async fn check_status(response: Response, context: &str) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();

        if let Ok(error_response) = serde_json::from_str::<OpenAIErrorResponse>(&error_text) {
            return Err(AppError::LLMApi(format!(
                "{} failed ({}): {} (code: {:?})",
                context, status, error_response.error.message, error_response.error.code
            )));
        }

        Err(AppError::LLMApi(format!("{} failed ({}): {}", context, status, error_text)))
    }
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response: ChatCompletionResponse = Self::send_json(
            self.authorized(self.client.post(self.url("/chat/completions")))
                .json(&body),
            "Chat completion",
        )
        .await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLMApi("OpenAI returned no choices".to_string()))?;

        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }
}

#[async_trait]
impl AssistantsApi for OpenAIAdapter {
    async fn list_assistants(&self) -> AppResult<Vec<Assistant>> {
        let mut assistants = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut query = vec![("limit", LIST_PAGE_SIZE.to_string()), ("order", "desc".to_string())];
            if let Some(cursor) = &after {
                query.push(("after", cursor.clone()));
            }

            let page: ListPage<Assistant> = Self::send_json(
                self.beta(self.client.get(self.url("/assistants"))).query(&query),
                "List assistants",
            )
            .await?;

            debug!(count = page.data.len(), has_more = page.has_more, "Fetched assistants page");
            assistants.extend(page.data);

            match (page.has_more, page.last_id) {
                (true, Some(last_id)) => after = Some(last_id),
                _ => break,
            }
        }

        Ok(assistants)
    }

    async fn create_assistant(&self, spec: &AssistantSpec) -> AppResult<Assistant> {
        let body = AssistantBody {
            name: &spec.name,
            instructions: &spec.instructions,
            model: &spec.model,
            tools: [CODE_INTERPRETER],
        };

        Self::send_json(
            self.beta(self.client.post(self.url("/assistants"))).json(&body),
            "Create assistant",
        )
        .await
    }

    async fn update_assistant(&self, assistant_id: &str, spec: &AssistantSpec) -> AppResult<Assistant> {
        let body = AssistantBody {
            name: &spec.name,
            instructions: &spec.instructions,
            model: &spec.model,
            tools: [CODE_INTERPRETER],
        };

        Self::send_json(
            self.beta(self.client.post(self.url(&format!("/assistants/{}", assistant_id))))
                .json(&body),
            "Update assistant",
        )
        .await
    }

    async fn upload_file(&self, path: &Path) -> AppResult<UploadedFile> {
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "dataset.json".to_string());

        debug!(path = %path.display(), length, "Streaming dataset upload");

        let body = Body::wrap_stream(ReaderStream::new(file));
        let part = multipart::Part::stream_with_length(body, length)
            .file_name(file_name)
            .mime_str("application/json")
            .map_err(|e| AppError::Internal(format!("Invalid upload content type: {}", e)))?;

        let form = multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);

        Self::send_json(
            self.authorized(self.client.post(self.url("/files"))).multipart(form),
            "File upload",
        )
        .await
    }

    async fn delete_file(&self, file_id: &str) -> AppResult<()> {
        let response = self
            .authorized(self.client.delete(self.url(&format!("/files/{}", file_id))))
            .send()
            .await
            .map_err(|e| AppError::LLMApi(format!("File delete request failed: {}", e)))?;

        Self::check_status(response, "File delete").await?;
        Ok(())
    }

    async fn create_thread(&self) -> AppResult<Thread> {
        Self::send_json(
            self.beta(self.client.post(self.url("/threads")))
                .json(&serde_json::json!({})),
            "Create thread",
        )
        .await
    }

    async fn create_message(&self, thread_id: &str, content: &str, file_id: &str) -> AppResult<()> {
        let body = MessageBody {
            role: "user",
            content,
            attachments: [Attachment {
                file_id,
                tools: [CODE_INTERPRETER],
            }],
        };

        let _: serde_json::Value = Self::send_json(
            self.beta(self.client.post(self.url(&format!("/threads/{}/messages", thread_id))))
                .json(&body),
            "Create message",
        )
        .await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> AppResult<Run> {
        Self::send_json(
            self.beta(self.client.post(self.url(&format!("/threads/{}/runs", thread_id))))
                .json(&RunBody { assistant_id }),
            "Create run",
        )
        .await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> AppResult<Run> {
        Self::send_json(
            self.beta(
                self.client
                    .get(self.url(&format!("/threads/{}/runs/{}", thread_id, run_id))),
            ),
            "Retrieve run",
        )
        .await
    }

    async fn list_messages(&self, thread_id: &str) -> AppResult<Vec<ThreadMessage>> {
        let page: ListPage<ThreadMessage> = Self::send_json(
            self.beta(self.client.get(self.url(&format!("/threads/{}/messages", thread_id))))
                .query(&[("order", "desc"), ("limit", LIST_PAGE_SIZE)]),
            "List messages",
        )
        .await?;
        Ok(page.data)
    }
}
