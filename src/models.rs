use std::sync::Arc;

use crate::chat::ChatService;
use crate::config::Config;
use crate::records::{DatasetCache, RecordsClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub chat: Arc<ChatService>,
    pub records: Arc<RecordsClient>,
    pub cache: DatasetCache,
}

// API Request/Response types

#[derive(Debug, serde::Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    /// Site whose cached records back the answer; latest cached site when absent
    #[serde(default)]
    pub site_id: Option<i64>,
}

/// Chat widget expects `{ "reply": string }` for successes and failures alike
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// Result of a site notification
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct SiteRecordsResponse {
    pub status: EnvelopeStatus,
    pub site_id: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SiteRecordsResponse {
    pub fn success(site_id: i64, message: String, record_count: usize, file_path: String) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            site_id,
            message,
            record_count: Some(record_count),
            file_path: Some(file_path),
            error: None,
        }
    }

    pub fn error(site_id: i64, message: String, error: String) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            site_id,
            message,
            record_count: None,
            file_path: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub ai_configured: bool,
    pub records_configured: bool,
}
