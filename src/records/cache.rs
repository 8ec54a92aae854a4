//! On-disk dataset cache
//!
//! One JSON file per site (`site_{id}.json`) under the data directory, holding the
//! raw platform response of the most recent fetch. Writes go through a temp file and
//! a rename so readers never see a partial file.

use std::path::PathBuf;
use std::time::SystemTime;

use tokio::fs;
use tracing::{debug, info};

use crate::records::client::SiteRecords;
use crate::types::AppResult;

const FILE_PREFIX: &str = "site_";
const FILE_SUFFIX: &str = ".json";

#[derive(Debug, Clone, PartialEq)]
pub struct CachedDataset {
    pub site_id: i64,
    pub path: PathBuf,
    pub modified: SystemTime,
}

#[derive(Debug, Clone)]
pub struct DatasetCache {
    data_dir: PathBuf,
}

impl DatasetCache {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn site_path(&self, site_id: i64) -> PathBuf {
        self.data_dir.join(site_file_name(site_id))
    }

    /// Replace the cached payload for `records.site_id`
    pub async fn store(&self, records: &SiteRecords) -> AppResult<CachedDataset> {
        fs::create_dir_all(&self.data_dir).await?;

        let target = self.site_path(records.site_id);
        let temp = self.data_dir.join(format!(
            ".{}.{}.tmp",
            site_file_name(records.site_id),
            uuid::Uuid::new_v4()
        ));

        let content = serde_json::to_vec_pretty(&records.payload)?;
        fs::write(&temp, content).await?;
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        let modified = fs::metadata(&target).await?.modified()?;
        info!(site_id = records.site_id, path = %target.display(), "Cached site records");

        Ok(CachedDataset {
            site_id: records.site_id,
            path: target,
            modified,
        })
    }

    /// Cached dataset for one site
    pub async fn for_site(&self, site_id: i64) -> AppResult<Option<CachedDataset>> {
        let path = self.site_path(site_id);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(CachedDataset {
                site_id,
                path,
                modified: meta.modified()?,
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Most recently modified dataset across all sites.
    ///
    /// Unrelated to which site a chat concerns; callers that know the site should use
    /// [`DatasetCache::for_site`].
    pub async fn latest(&self) -> AppResult<Option<CachedDataset>> {
        let mut entries = match fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut latest: Option<CachedDataset> = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(site_id) = name.to_str().and_then(parse_site_id) else {
                continue;
            };

            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified()?;

            if latest.as_ref().map_or(true, |current| modified > current.modified) {
                latest = Some(CachedDataset {
                    site_id,
                    path: entry.path(),
                    modified,
                });
            }
        }

        debug!(found = latest.is_some(), "Resolved latest cached dataset");
        Ok(latest)
    }

    /// Dataset for `site_id` when given, otherwise the latest one
    pub async fn resolve(&self, site_id: Option<i64>) -> AppResult<Option<CachedDataset>> {
        match site_id {
            Some(id) => self.for_site(id).await,
            None => self.latest().await,
        }
    }
}

pub fn site_file_name(site_id: i64) -> String {
    format!("{}{}{}", FILE_PREFIX, site_id, FILE_SUFFIX)
}

fn parse_site_id(file_name: &str) -> Option<i64> {
    file_name
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn records(site_id: i64, data: serde_json::Value) -> SiteRecords {
        SiteRecords::from_payload(site_id, serde_json::json!({"Response": {"Data": data}}))
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        std::fs::OpenOptions::new()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_parse_site_id() {
        assert_eq!(parse_site_id("site_42.json"), Some(42));
        assert_eq!(parse_site_id("site_abc.json"), None);
        assert_eq!(parse_site_id(".site_42.json.1234.tmp"), None);
        assert_eq!(parse_site_id("other.json"), None);
    }

    #[tokio::test]
    async fn test_second_store_replaces_first() {
        let dir = TempDir::new().unwrap();
        let cache = DatasetCache::new(dir.path().join("data"));

        cache
            .store(&records(7, serde_json::json!([{"id": 1}, {"id": 2}, {"id": 3}])))
            .await
            .unwrap();
        let second = cache
            .store(&records(7, serde_json::json!([{"id": 9}])))
            .await
            .unwrap();

        let content = tokio::fs::read_to_string(&second.path).await.unwrap();
        let stored: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(stored, serde_json::json!({"Response": {"Data": [{"id": 9}]}}));

        let mut entries = std::fs::read_dir(dir.path().join("data")).unwrap();
        assert!(entries.next().is_some());
        assert!(entries.next().is_none(), "temp files must not be left behind");
    }

    #[tokio::test]
    async fn test_latest_uses_modification_time_not_site_id() {
        let dir = TempDir::new().unwrap();
        let cache = DatasetCache::new(dir.path());

        let older = cache.store(&records(900, serde_json::json!([]))).await.unwrap();
        let newer = cache.store(&records(3, serde_json::json!([]))).await.unwrap();

        let base = SystemTime::now() - Duration::from_secs(600);
        set_mtime(&older.path, base);
        set_mtime(&newer.path, base + Duration::from_secs(60));

        let latest = cache.latest().await.unwrap().unwrap();
        assert_eq!(latest.site_id, 3);

        set_mtime(&older.path, base + Duration::from_secs(120));
        let latest = cache.latest().await.unwrap().unwrap();
        assert_eq!(latest.site_id, 900);
    }

    #[tokio::test]
    async fn test_missing_directory_has_no_dataset() {
        let dir = TempDir::new().unwrap();
        let cache = DatasetCache::new(dir.path().join("absent"));

        assert!(cache.latest().await.unwrap().is_none());
        assert!(cache.for_site(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_prefers_explicit_site() {
        let dir = TempDir::new().unwrap();
        let cache = DatasetCache::new(dir.path());

        cache.store(&records(1, serde_json::json!([]))).await.unwrap();
        let newest = cache.store(&records(2, serde_json::json!([]))).await.unwrap();
        set_mtime(&newest.path, SystemTime::now() + Duration::from_secs(60));

        assert_eq!(cache.resolve(Some(1)).await.unwrap().unwrap().site_id, 1);
        assert_eq!(cache.resolve(None).await.unwrap().unwrap().site_id, 2);
        assert!(cache.resolve(Some(5)).await.unwrap().is_none());
    }
}
