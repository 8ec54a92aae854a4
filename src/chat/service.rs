//! Chat job orchestration
//!
//! Every inbound message becomes one [`ChatJob`]. Plain questions take the stateless
//! path (one completion call). Questions about the records take the attachment
//! workflow:
//!
//! ```text
//! resolve dataset → resolve assistant → upload file → create thread
//!     → post message → start run → wait for run → extract reply
//! ```
//!
//! Any failure ends the job with a localized message; nothing is retried.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chat::assistant_registry::AssistantRegistry;
use crate::chat::classifier::{Classification, MessageClassifier, ModelTier};
use crate::chat::prompts::{ASSISTANT_INSTRUCTIONS, SYSTEM_PROMPT};
use crate::chat::run_waiter::{wait_for_run, RunOutcome, WaitOptions};
use crate::config::{ChatConfig, LLMConfig};
use crate::llm::provider::{AiProvider, AssistantSpec, ThreadMessage};
use crate::records::cache::{CachedDataset, DatasetCache};
use crate::types::{AppError, LLMMessage, LLMRequest};

pub const MSG_API_KEY_INVALID: &str =
    "OpenAI APIキーが不正または無効です。サーバーの設定をご確認ください。";
pub const MSG_NO_DATA: &str =
    "プリザンターデータが見つかりません。サイトIDを受信してからお試しください。";

pub fn general_error(detail: impl std::fmt::Display) -> String {
    format!("エラーが発生しました: {}", detail)
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("OpenAI API key is not configured")]
    MissingApiKey,

    #[error("no cached dataset")]
    NoData,

    #[error("アシスタントの作成に失敗")]
    Assistant(#[source] AppError),

    #[error("ファイルアップロードに失敗")]
    Upload(#[source] AppError),

    #[error("{}", run_outcome_text(.0))]
    Run(RunOutcome),

    #[error("応答の取得に失敗")]
    NoReply,

    #[error("{0}")]
    Provider(#[from] AppError),
}

fn run_outcome_text(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::TimedOut => "実行タイムアウト".to_string(),
        RunOutcome::Failed(status) => format!("実行が失敗しました: {}", status),
        RunOutcome::Cancelled => "実行がキャンセルされました".to_string(),
        RunOutcome::Completed => "実行完了".to_string(),
    }
}

impl JobError {
    /// Text returned to the chat widget
    pub fn user_message(&self) -> String {
        match self {
            JobError::MissingApiKey => MSG_API_KEY_INVALID.to_string(),
            JobError::NoData => MSG_NO_DATA.to_string(),
            other => general_error(other),
        }
    }
}

/// One inbound message, alive until its reply is produced
#[derive(Debug, Clone)]
pub struct ChatJob {
    pub id: Uuid,
    pub text: String,
    pub site_id: Option<i64>,
    pub classification: Classification,
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub simple_model: String,
    pub advanced_model: String,
    pub chat: ChatConfig,
}

impl ChatSettings {
    pub fn from_config(llm: &LLMConfig, chat: &ChatConfig) -> Self {
        Self {
            simple_model: llm.simple_model.clone(),
            advanced_model: llm.advanced_model.clone(),
            chat: chat.clone(),
        }
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Simple => &self.simple_model,
            ModelTier::Advanced => &self.advanced_model,
        }
    }

    fn assistant_spec(&self) -> AssistantSpec {
        AssistantSpec {
            name: self.chat.assistant_name.clone(),
            instructions: ASSISTANT_INSTRUCTIONS.to_string(),
            model: self.advanced_model.clone(),
        }
    }
}

pub struct ChatService {
    provider: Option<Arc<dyn AiProvider>>,
    classifier: MessageClassifier,
    registry: AssistantRegistry,
    cache: DatasetCache,
    settings: ChatSettings,
    shutdown: CancellationToken,
}

impl ChatService {
    pub fn new(
        provider: Option<Arc<dyn AiProvider>>,
        cache: DatasetCache,
        settings: ChatSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            provider,
            classifier: MessageClassifier::new(),
            registry: AssistantRegistry::new(),
            cache,
            settings,
            shutdown,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Answer one chat message. Never fails: errors become localized reply text.
    pub async fn process_message(&self, text: &str, site_id: Option<i64>) -> String {
        let job = ChatJob {
            id: Uuid::new_v4(),
            text: text.to_string(),
            site_id,
            classification: self.classifier.classify(text),
        };

        info!(
            job_id = %job.id,
            message_len = job.text.chars().count(),
            requires_dataset = job.classification.requires_dataset,
            tier = ?job.classification.tier,
            reason = ?job.classification.reason,
            "Chat job received"
        );

        match self.run_job(&job).await {
            Ok(reply) => {
                info!(job_id = %job.id, reply_len = reply.chars().count(), "Chat job completed");
                reply
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Chat job failed");
                e.user_message()
            }
        }
    }

    async fn run_job(&self, job: &ChatJob) -> Result<String, JobError> {
        let provider = self.provider.clone().ok_or(JobError::MissingApiKey)?;

        if job.classification.requires_dataset {
            self.run_attachment_workflow(provider, job).await
        } else {
            self.run_stateless(provider.as_ref(), job).await
        }
    }

    async fn run_stateless(&self, provider: &dyn AiProvider, job: &ChatJob) -> Result<String, JobError> {
        let request = LLMRequest {
            model: self.settings.model_for(job.classification.tier).to_string(),
            messages: vec![LLMMessage::system(SYSTEM_PROMPT), LLMMessage::user(&job.text)],
            max_tokens: None,
            temperature: None,
        };

        let response = provider.create_chat_completion(&request).await?;
        Ok(response.content)
    }

    async fn run_attachment_workflow(
        &self,
        provider: Arc<dyn AiProvider>,
        job: &ChatJob,
    ) -> Result<String, JobError> {
        // Checked before any provider call
        let dataset = self
            .cache
            .resolve(job.site_id)
            .await?
            .ok_or(JobError::NoData)?;

        info!(
            job_id = %job.id,
            site_id = dataset.site_id,
            requested_site = ?job.site_id,
            path = %dataset.path.display(),
            "Resolved dataset"
        );

        let spec = self.settings.assistant_spec();
        let assistant = self
            .registry
            .get_or_create(provider.as_ref(), &spec)
            .await
            .map_err(|e| {
                error!(job_id = %job.id, error = %e, "Assistant resolution failed");
                JobError::Assistant(e)
            })?;

        let file = provider.upload_file(&dataset.path).await.map_err(|e| {
            error!(job_id = %job.id, error = %e, "Dataset upload failed");
            JobError::Upload(e)
        })?;

        let upload = UploadedDataset::new(provider.clone(), file.id.clone(), job.id);

        let result = self
            .converse(provider.as_ref(), job, &spec.name, &assistant.id, &file.id, &dataset)
            .await;

        upload.release().await;
        result
    }

    async fn converse(
        &self,
        provider: &dyn AiProvider,
        job: &ChatJob,
        assistant_name: &str,
        assistant_id: &str,
        file_id: &str,
        dataset: &CachedDataset,
    ) -> Result<String, JobError> {
        let thread = provider.create_thread().await?;
        provider.create_message(&thread.id, &job.text, file_id).await?;
        let run = match provider.create_run(&thread.id, assistant_id).await {
            Ok(run) => run,
            Err(e) => {
                // The assistant may be gone remotely; look it up again on the next job
                warn!(job_id = %job.id, assistant_id, error = %e, "Run could not be started");
                self.registry.invalidate(assistant_name).await;
                return Err(e.into());
            }
        };

        info!(
            job_id = %job.id,
            thread_id = %thread.id,
            run_id = %run.id,
            site_id = dataset.site_id,
            "Run started"
        );

        let options = WaitOptions::with_timeout(
            self.settings.chat.poll_interval(),
            self.settings.chat.run_timeout(),
        );
        let cancel = self.shutdown.child_token();

        match wait_for_run(provider, &thread.id, &run.id, options, &cancel).await? {
            RunOutcome::Completed => {}
            outcome => return Err(JobError::Run(outcome)),
        }

        let messages = provider.list_messages(&thread.id).await?;
        extract_reply(&messages).ok_or(JobError::NoReply)
    }
}

/// Provider-side copy of a dataset, deleted best-effort once the job is done.
///
/// Dropping the guard without [`UploadedDataset::release`] (an abandoned request)
/// moves the deletion onto a background task.
struct UploadedDataset {
    provider: Arc<dyn AiProvider>,
    file_id: Option<String>,
    job_id: Uuid,
}

impl UploadedDataset {
    fn new(provider: Arc<dyn AiProvider>, file_id: String, job_id: Uuid) -> Self {
        Self {
            provider,
            file_id: Some(file_id),
            job_id,
        }
    }

    async fn release(mut self) {
        if let Some(file_id) = self.file_id.take() {
            delete_upload(self.provider.as_ref(), &file_id, self.job_id).await;
        }
    }
}

impl Drop for UploadedDataset {
    fn drop(&mut self) {
        let Some(file_id) = self.file_id.take() else {
            return;
        };

        let provider = self.provider.clone();
        let job_id = self.job_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(job_id = %job_id, file_id = %file_id, "Job abandoned, deleting upload in background");
                handle.spawn(async move {
                    delete_upload(provider.as_ref(), &file_id, job_id).await;
                });
            }
            Err(_) => {
                warn!(job_id = %job_id, file_id = %file_id, "No runtime available, uploaded dataset left behind");
            }
        }
    }
}

async fn delete_upload(provider: &dyn AiProvider, file_id: &str, job_id: Uuid) {
    if let Err(e) = provider.delete_file(file_id).await {
        warn!(job_id = %job_id, file_id, error = %e, "Failed to delete uploaded dataset");
    }
}

/// Text of the most recent assistant message that carries any text part.
/// `messages` is ordered most recent first.
pub fn extract_reply(messages: &[ThreadMessage]) -> Option<String> {
    messages
        .iter()
        .filter(|m| m.role == "assistant")
        .find_map(|m| m.first_text())
        .map(str::to_string)
}
