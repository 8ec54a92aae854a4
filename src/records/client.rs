//! Records platform REST client
//!
//! Fetches every record of a site through `POST {base}/api/items/{site_id}/get`,
//! authenticated by the static API key carried in the request body.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::RecordsConfig;

#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("PLEASANTER_API_KEY環境変数が設定されていません")]
    MissingApiKey,

    #[error("HTTPエラー: {status}")]
    Http { status: u16, body: String },

    #[error("タイムアウト")]
    Timeout,

    #[error("{0}")]
    Request(String),

    #[error("レスポンスの解析に失敗しました: {0}")]
    Decode(String),
}

impl RecordsError {
    /// User-facing summary for the site envelope's `message` field
    pub fn user_message(&self, site_id: i64) -> String {
        match self {
            RecordsError::MissingApiKey => "APIキーの設定を確認してください".to_string(),
            RecordsError::Http { .. } | RecordsError::Decode(_) => {
                format!("サイトID {} のレコード取得に失敗しました", site_id)
            }
            RecordsError::Timeout => "プリザンターサーバーへの接続がタイムアウトしました".to_string(),
            RecordsError::Request(e) => format!("予期しないエラーが発生しました: {}", e),
        }
    }
}

/// One successful fetch
#[derive(Debug, Clone)]
pub struct SiteRecords {
    pub site_id: i64,
    /// Raw platform response, cached as-is
    pub payload: serde_json::Value,
    pub record_count: usize,
}

impl SiteRecords {
    pub fn from_payload(site_id: i64, payload: serde_json::Value) -> Self {
        let record_count = payload
            .get("Response")
            .and_then(|r| r.get("Data"))
            .and_then(|d| d.as_array())
            .map(|a| a.len())
            .unwrap_or(0);

        Self {
            site_id,
            payload,
            record_count,
        }
    }
}

#[derive(Serialize)]
struct GetItemsRequest<'a> {
    #[serde(rename = "ApiKey")]
    api_key: &'a str,
}

pub struct RecordsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RecordsClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, RecordsError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RecordsError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &RecordsConfig) -> Result<Self, RecordsError> {
        Self::new(
            &config.base_url,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn get_records(&self, site_id: i64) -> Result<SiteRecords, RecordsError> {
        let api_key = self.api_key.as_deref().ok_or(RecordsError::MissingApiKey)?;
        let url = format!("{}/api/items/{}/get", self.base_url, site_id);

        info!(site_id, "Fetching site records");

        let response = self
            .client
            .post(&url)
            .json(&GetItemsRequest { api_key })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RecordsError::Timeout
                } else {
                    RecordsError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(site_id, status = status.as_u16(), body = %body, "Records platform rejected request");
            return Err(RecordsError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RecordsError::Decode(e.to_string()))?;

        let records = SiteRecords::from_payload(site_id, payload);
        info!(site_id, record_count = records.record_count, "Fetched site records");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(url: &str, key: Option<&str>) -> RecordsClient {
        RecordsClient::new(url, key.map(String::from), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_get_records_counts_data() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/items/123/get")
            .match_body(Matcher::Json(serde_json::json!({"ApiKey": "secret"})))
            .with_status(200)
            .with_body(r#"{"StatusCode":200,"Response":{"Offset":0,"TotalCount":3,"Data":[{"ResultId":1},{"ResultId":2},{"ResultId":3}]}}"#)
            .create_async()
            .await;

        let records = client(&server.url(), Some("secret")).get_records(123).await.unwrap();
        assert_eq!(records.site_id, 123);
        assert_eq!(records.record_count, 3);
        assert_eq!(records.payload["StatusCode"], 200);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_api_key_skips_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = client(&server.url(), None).get_records(1).await.unwrap_err();
        assert!(matches!(err, RecordsError::MissingApiKey));
        assert_eq!(err.user_message(1), "APIキーの設定を確認してください");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/items/9/get")
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let err = client(&server.url(), Some("bad")).get_records(9).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTPエラー: 401");
        assert_eq!(err.user_message(9), "サイトID 9 のレコード取得に失敗しました");
    }

    #[test]
    fn test_record_count_without_data() {
        let records = SiteRecords::from_payload(5, serde_json::json!({"Response": {}}));
        assert_eq!(records.record_count, 0);
    }
}
