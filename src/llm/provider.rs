use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{AppResult, LLMRequest, LLMResponse};

/// Stateless single-turn completion
#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Stateful assistant workflow: assistants, files, threads, messages and runs
#[async_trait]
pub trait AssistantsApi: Send + Sync {
    /// Every assistant owned by the credential, across all pages
    async fn list_assistants(&self) -> AppResult<Vec<Assistant>>;

    async fn create_assistant(&self, spec: &AssistantSpec) -> AppResult<Assistant>;

    async fn update_assistant(&self, assistant_id: &str, spec: &AssistantSpec) -> AppResult<Assistant>;

    /// Upload a file for use by the assistant tooling
    async fn upload_file(&self, path: &Path) -> AppResult<UploadedFile>;

    async fn delete_file(&self, file_id: &str) -> AppResult<()>;

    async fn create_thread(&self) -> AppResult<Thread>;

    /// Post a user message with the given file attached for code execution
    async fn create_message(&self, thread_id: &str, content: &str, file_id: &str) -> AppResult<()>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> AppResult<Run>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> AppResult<Run>;

    /// Thread messages, most recent first
    async fn list_messages(&self, thread_id: &str) -> AppResult<Vec<ThreadMessage>>;
}

/// Everything the chat orchestrator needs from one provider
pub trait AiProvider: LLMAdapter + AssistantsApi {}

impl<T: LLMAdapter + AssistantsApi> AiProvider for T {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantSpec {
    pub name: String,
    pub instructions: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub model: String,
}

impl Assistant {
    /// Whether the remote configuration has drifted from `spec`
    pub fn differs_from(&self, spec: &AssistantSpec) -> bool {
        self.instructions.as_deref() != Some(spec.instructions.as_str()) || self.model != spec.model
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Terminal statuses that end the job without a reply
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired | RunStatus::Incomplete
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessagePart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessagePart {
    #[serde(rename = "text")]
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextValue {
    pub value: String,
}

impl ThreadMessage {
    /// First text-typed content part, if any
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|part| match part {
            MessagePart::Text { text } => Some(text.value.as_str()),
            MessagePart::Other => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_parsing() {
        let run: Run = serde_json::from_str(r#"{"id":"run_1","status":"in_progress"}"#).unwrap();
        assert_eq!(run.status, RunStatus::InProgress);

        let run: Run = serde_json::from_str(r#"{"id":"run_1","status":"something_new"}"#).unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
        assert!(!run.status.is_failure());
    }

    #[test]
    fn test_failure_statuses() {
        assert!(RunStatus::Failed.is_failure());
        assert!(RunStatus::Cancelled.is_failure());
        assert!(RunStatus::Expired.is_failure());
        assert!(RunStatus::Incomplete.is_failure());
        assert!(!RunStatus::RequiresAction.is_failure());
        assert!(!RunStatus::Cancelling.is_failure());
        assert!(!RunStatus::InProgress.is_failure());
        assert!(!RunStatus::Queued.is_failure());
        assert!(!RunStatus::Completed.is_failure());
    }

    #[test]
    fn test_first_text_skips_non_text_parts() {
        let message: ThreadMessage = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "role": "assistant",
            "content": [
                {"type": "image_file", "image_file": {"file_id": "file_1"}},
                {"type": "text", "text": {"value": "12件です", "annotations": []}}
            ]
        }))
        .unwrap();

        assert_eq!(message.first_text(), Some("12件です"));
    }

    #[test]
    fn test_assistant_drift() {
        let spec = AssistantSpec {
            name: "analyst".to_string(),
            instructions: "v2".to_string(),
            model: "gpt-4".to_string(),
        };
        let mut assistant = Assistant {
            id: "asst_1".to_string(),
            name: Some("analyst".to_string()),
            instructions: Some("v2".to_string()),
            model: "gpt-4".to_string(),
        };
        assert!(!assistant.differs_from(&spec));

        assistant.instructions = Some("v1".to_string());
        assert!(assistant.differs_from(&spec));
    }
}
