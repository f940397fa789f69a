//! Portable export and re-import of a session's image history.

use crate::db::models::{format_timestamp, parse_timestamp};
use crate::db::{ImageRecord, ImageStorage, NewImage, ResponseFormat};
use crate::error::GalleryError;
use crate::service::content::ContentRoot;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

const EXPORT_PREFIX: &str = "image_history_";

/// Export documents older than this are removed by the next export.
pub const EXPORT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// One exported row. Every stored field except the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub prompt: String,
    pub model: String,
    pub size: String,
    #[serde(default)]
    pub quality: Option<String>,
    pub response_format: ResponseFormat,
    pub image_path: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl From<&ImageRecord> for HistoryEntry {
    fn from(r: &ImageRecord) -> Self {
        Self {
            prompt: r.prompt.clone(),
            model: r.model.clone(),
            size: r.size.clone(),
            quality: r.quality.clone(),
            response_format: r.response_format,
            image_path: r.image_path.clone(),
            timestamp: Some(format_timestamp(&r.timestamp)),
        }
    }
}

/// A written export document.
#[derive(Debug, Clone)]
pub struct ExportedHistory {
    /// Name offered to the browser.
    pub download_name: String,
    /// Where the document was written.
    pub path: PathBuf,
    pub document: Vec<u8>,
    pub entries: usize,
}

#[derive(Clone)]
pub struct HistoryService {
    storage: ImageStorage,
    content: ContentRoot,
    export_dir: PathBuf,
}

impl HistoryService {
    pub fn new(storage: ImageStorage, content: ContentRoot, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            content,
            export_dir: export_dir.into(),
        }
    }

    /// Serialize every row of `session_id`, most recent first, and write the
    /// document under the export directory.
    pub async fn export(&self, session_id: &str) -> Result<ExportedHistory, GalleryError> {
        let records = self.storage.list_session(session_id).await?;
        let entries: Vec<HistoryEntry> = records.iter().map(HistoryEntry::from).collect();
        let document = serde_json::to_vec_pretty(&entries)?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let download_name = format!("{EXPORT_PREFIX}{stamp}.json");
        let path = self.export_dir.join(format!(
            "{EXPORT_PREFIX}{stamp}_{}.json",
            Uuid::new_v4().simple()
        ));
        tokio::fs::create_dir_all(&self.export_dir).await?;
        self.prune_exports().await;
        tokio::fs::write(&path, &document).await?;

        info!(entries = entries.len(), path = %path.display(), "exported session history");
        Ok(ExportedHistory {
            download_name,
            path,
            document,
            entries: entries.len(),
        })
    }

    /// Re-ingest an export document into `session_id`. Returns how many rows
    /// were inserted.
    ///
    /// The document must be a JSON array. Elements that do not decode, or whose
    /// original is not present under the content root, are skipped.
    pub async fn import(&self, session_id: &str, document: &[u8]) -> Result<usize, GalleryError> {
        let raw: Vec<Value> = serde_json::from_slice(document).map_err(|e| {
            GalleryError::Validation(format!("Invalid history document: {e}"))
        })?;

        let mut rows = Vec::with_capacity(raw.len());
        for (index, value) in raw.into_iter().enumerate() {
            let entry: HistoryEntry = match serde_json::from_value(value) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed history entry");
                    continue;
                }
            };
            if !self.original_exists(&entry.image_path).await {
                debug!(index, image_path = %entry.image_path, "skipping entry with missing image");
                continue;
            }
            rows.push(self.to_new_image(session_id, entry));
        }

        let ids = self.storage.insert_many(&rows).await?;
        info!(imported = ids.len(), "imported session history");
        Ok(ids.len())
    }

    /// Remove export documents past [`EXPORT_RETENTION`]. Other files in the
    /// directory are left alone; failures are logged.
    async fn prune_exports(&self) {
        let mut entries = match tokio::fs::read_dir(&self.export_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "cannot list export directory");
                return;
            }
        };
        let now = SystemTime::now();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(EXPORT_PREFIX) || !name.ends_with(".json") {
                continue;
            }
            let expired = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > EXPORT_RETENTION);
            if !expired {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => debug!(file = name, "removed expired export"),
                Err(e) => warn!(file = name, error = %e, "failed to remove expired export"),
            }
        }
    }

    async fn original_exists(&self, image_path: &str) -> bool {
        match self.content.resolve_original(image_path) {
            Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            None => false,
        }
    }

    fn to_new_image(&self, session_id: &str, entry: HistoryEntry) -> NewImage {
        let timestamp = entry
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);
        NewImage {
            session_id: session_id.to_string(),
            prompt: entry.prompt,
            model: entry.model,
            size: entry.size,
            quality: entry.quality,
            response_format: entry.response_format,
            image_path: entry.image_path,
            timestamp,
        }
    }
}
