use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::llm::openai::OPENAI_API_BASE;

/// Display name of the shared analysis assistant on the OpenAI side.
pub const DEFAULT_ASSISTANT_NAME: &str = "プリザンターデータ分析アシスタント";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub records: RecordsConfig,
    pub chat: ChatConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    /// Cheap tier, used for the stateless path
    pub simple_model: String,
    /// Capable tier, used by the analysis assistant
    pub advanced_model: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    pub assistant_name: String,
    pub run_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub data_dir: PathBuf,
}

impl LLMConfig {
    /// The configured API key, treating an empty value as absent
    pub fn active_api_key(&self) -> Option<String> {
        non_empty(self.openai_api_key.clone())
    }
}

impl ChatConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            run_timeout_secs: 30,
            poll_interval_ms: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "*".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            llm: LLMConfig {
                openai_api_key: non_empty(env::var("OPENAI_API_KEY").ok()),
                openai_base_url: env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| OPENAI_API_BASE.to_string()),
                simple_model: env::var("CHAT_MODEL_SIMPLE")
                    .unwrap_or_else(|_| "gpt-3.5-turbo".to_string()),
                advanced_model: env::var("CHAT_MODEL_ADVANCED")
                    .unwrap_or_else(|_| "gpt-4-1106-preview".to_string()),
                request_timeout_secs: env::var("OPENAI_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()?,
            },
            records: RecordsConfig {
                base_url: env::var("PLEASANTER_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost".to_string()),
                api_key: non_empty(env::var("PLEASANTER_API_KEY").ok()),
                timeout_secs: env::var("PLEASANTER_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
            },
            chat: ChatConfig {
                assistant_name: env::var("ASSISTANT_NAME")
                    .unwrap_or_else(|_| DEFAULT_ASSISTANT_NAME.to_string()),
                run_timeout_secs: env::var("RUN_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
                poll_interval_ms: env::var("RUN_POLL_INTERVAL_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()?,
            },
            cache: CacheConfig {
                data_dir: env::var("DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("data")),
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
