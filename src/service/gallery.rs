use crate::db::models::format_timestamp;
use crate::db::{ImageFilter, ImageRecord, ImageStorage};
use crate::error::GalleryError;
use crate::service::content::{ContentRoot, thumbnail_path_for};
use crate::service::thumbnail::ThumbnailCache;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// Which rows a listing may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryScope {
    /// One browser session; any session filter is overridden.
    Session(String),
    /// Every row (admin).
    All,
}

/// Normalized pagination input. Page numbers below 1 clamp to 1 and the page
/// size clamps to `1..=MAX_PER_PAGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(DEFAULT_PAGE).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    /// Like [`PageRequest::new`] for raw query values; anything that is not
    /// an integer counts as absent.
    pub fn parse(page: Option<&str>, per_page: Option<&str>) -> Self {
        let int = |v: Option<&str>| v.and_then(|s| s.trim().parse::<i64>().ok());
        Self::new(int(page), int(per_page))
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// `ceil(total_count / per_page)`, 0 for an empty set.
pub fn total_pages(total_count: i64, per_page: i64) -> i64 {
    if total_count <= 0 || per_page <= 0 {
        return 0;
    }
    (total_count + per_page - 1) / per_page
}

/// Display-ready row.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GalleryItem {
    pub id: i64,
    pub session_id: String,
    pub prompt: String,
    pub model: String,
    pub size: String,
    pub quality: Option<String>,
    pub image_path: String,
    /// The thumbnail, or the original when none could be produced.
    pub thumbnail_path: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GalleryPage {
    pub images: Vec<GalleryItem>,
    pub current_page: i64,
    pub per_page: i64,
    pub total_pages: i64,
    pub total_count: i64,
}

impl GalleryPage {
    /// A page with no rows at all.
    pub fn empty(req: PageRequest) -> Self {
        Self {
            images: Vec::new(),
            current_page: req.page,
            per_page: req.per_page,
            total_pages: 0,
            total_count: 0,
        }
    }
}

#[derive(Clone)]
pub struct Gallery {
    storage: ImageStorage,
    content: ContentRoot,
    thumbnails: ThumbnailCache,
}

impl Gallery {
    pub fn new(storage: ImageStorage, content: ContentRoot) -> Self {
        let thumbnails = ThumbnailCache::new(content.clone());
        Self {
            storage,
            content,
            thumbnails,
        }
    }

    /// One page of rows with thumbnails ensured. Pages past the end are empty.
    pub async fn page(
        &self,
        scope: &GalleryScope,
        filter: &ImageFilter,
        req: PageRequest,
    ) -> Result<GalleryPage, GalleryError> {
        let mut filter = filter.clone();
        if let GalleryScope::Session(session_id) = scope {
            filter.session_id = Some(session_id.clone());
        }

        let (rows, total_count) = self
            .storage
            .list(&filter, req.per_page, req.offset())
            .await?;

        let mut images = Vec::with_capacity(rows.len());
        for record in rows {
            let thumbnail_path = self
                .thumbnails
                .ensure_thumbnail(&record.image_path)
                .await
                .unwrap_or_else(|| record.image_path.clone());
            images.push(GalleryItem::from_record(record, thumbnail_path));
        }

        Ok(GalleryPage {
            images,
            current_page: req.page,
            per_page: req.per_page,
            total_pages: total_pages(total_count, req.per_page),
            total_count,
        })
    }

    /// Remove a row, then its original and thumbnail files.
    ///
    /// The row is deleted in its own transaction first. Both file removals are
    /// always attempted; a failed or impossible removal is logged and does not
    /// fail the delete. Unknown ids touch nothing on disk.
    pub async fn delete(&self, id: i64) -> Result<ImageRecord, GalleryError> {
        let record = self
            .storage
            .delete(id)
            .await?
            .ok_or_else(|| GalleryError::NotFound("Image not found".to_string()))?;

        let thumbnail = thumbnail_path_for(&record.image_path);
        let targets = [
            (record.image_path.as_str(), self.content.resolve_original(&record.image_path)),
            (thumbnail.as_str(), self.content.resolve(&thumbnail)),
        ];
        for (web_path, fs_path) in targets {
            match fs_path {
                Some(fs_path) => remove_if_exists(&fs_path).await,
                None => warn!(id, web_path, "not removing file outside the content root"),
            }
        }

        info!(id, image_path = %record.image_path, "deleted image");
        Ok(record)
    }
}

async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove image file"),
    }
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_timestamp(ts))
}

impl GalleryItem {
    fn from_record(record: ImageRecord, thumbnail_path: String) -> Self {
        Self {
            id: record.id,
            session_id: record.session_id,
            prompt: record.prompt,
            model: record.model,
            size: record.size,
            quality: record.quality,
            image_path: record.image_path,
            thumbnail_path,
            timestamp: record.timestamp,
        }
    }
}
