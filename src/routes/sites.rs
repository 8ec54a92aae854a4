use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{error, info};

use crate::models::{AppState, SiteRecordsResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/site-id/{site_id}", post(receive_site_id))
        .with_state(state)
}

/// Fetch the site's records and replace its cache file
pub async fn receive_site_id(
    State(state): State<AppState>,
    Path(site_id): Path<i64>,
) -> (StatusCode, Json<SiteRecordsResponse>) {
    info!(site_id, "Received site notification");

    let records = match state.records.get_records(site_id).await {
        Ok(records) => records,
        Err(e) => {
            error!(site_id, error = %e, "Failed to fetch site records");
            let body = SiteRecordsResponse::error(site_id, e.user_message(site_id), e.to_string());
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(body));
        }
    };

    match state.cache.store(&records).await {
        Ok(cached) => {
            let body = SiteRecordsResponse::success(
                site_id,
                format!("サイトID {} のレコードを取得しました", site_id),
                records.record_count,
                cached.path.display().to_string(),
            );
            (StatusCode::OK, Json(body))
        }
        Err(e) => {
            error!(site_id, error = %e, "Failed to cache site records");
            let body = SiteRecordsResponse::error(
                site_id,
                format!("予期しないエラーが発生しました: {}", e),
                e.to_string(),
            );
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body))
        }
    }
}
