use crate::api::ImageApi;
use crate::db::ResponseFormat;
use crate::error::GalleryError;
use crate::service::content::{ContentRoot, original_web_path};
use crate::types::images::GeneratedItem;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};
use uuid::Uuid;

/// Filename prefix for images produced by the generator.
pub const FILENAME_PREFIX: &str = "generated_image";

/// Where the bytes of one generated item come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePayload<'a> {
    /// Remote resource to fetch.
    RemoteUrl(&'a str),
    /// `data:` URL with an inline base64 body.
    DataUrl(&'a str),
    /// Bare base64 payload.
    Inline(&'a str),
}

impl ImagePayload<'_> {
    pub fn response_format(&self) -> ResponseFormat {
        match self {
            Self::RemoteUrl(_) | Self::DataUrl(_) => ResponseFormat::Url,
            Self::Inline(_) => ResponseFormat::B64Json,
        }
    }

    /// Non-empty `url` wins over `b64_json`; `None` when neither is usable.
    pub fn classify(item: &GeneratedItem) -> Option<ImagePayload<'_>> {
        if let Some(url) = item.url.as_deref().filter(|u| !u.is_empty()) {
            return Some(if url.starts_with("data:") {
                ImagePayload::DataUrl(url)
            } else {
                ImagePayload::RemoteUrl(url)
            });
        }
        item.b64_json
            .as_deref()
            .filter(|b| !b.is_empty())
            .map(ImagePayload::Inline)
    }
}

/// A stored original, ready to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub image_path: String,
    pub response_format: ResponseFormat,
}

/// Turns provider items into files under the originals directory.
#[derive(Clone)]
pub struct Ingestor {
    client: reqwest::Client,
    content: ContentRoot,
}

impl Ingestor {
    pub fn new(client: reqwest::Client, content: ContentRoot) -> Self {
        Self { client, content }
    }

    /// Store every usable item. Items without a payload and items that fail to
    /// fetch, decode or write are logged and left out; the rest are returned
    /// in input order.
    pub async fn ingest_batch(&self, items: &[GeneratedItem], prefix: &str) -> Vec<StoredImage> {
        let mut stored = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let Some(payload) = ImagePayload::classify(item) else {
                warn!(index, "no image data found in provider item; skipping");
                continue;
            };
            match self.ingest(payload, prefix).await {
                Ok(image_path) => stored.push(StoredImage {
                    image_path,
                    response_format: payload.response_format(),
                }),
                Err(e) => {
                    warn!(index, error = %e, "failed to store generated image; skipping");
                }
            }
        }
        stored
    }

    /// Fetch or decode one payload and persist it. Returns the web path.
    pub async fn ingest(
        &self,
        payload: ImagePayload<'_>,
        prefix: &str,
    ) -> Result<String, GalleryError> {
        let bytes = match payload {
            ImagePayload::RemoteUrl(url) => ImageApi::fetch_image(&self.client, url).await?,
            ImagePayload::DataUrl(url) => decode_data_url(url)?,
            ImagePayload::Inline(b64) => decode_inline(b64)?,
        };
        self.persist(&bytes, prefix).await
    }

    async fn persist(&self, bytes: &[u8], prefix: &str) -> Result<String, GalleryError> {
        let file_name = unique_file_name(prefix);
        let path = self.content.originals_dir().join(&file_name);
        if let Err(e) = tokio::fs::write(&path, bytes).await {
            // do not leave a truncated original behind
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }
        debug!(path = %path.display(), size = bytes.len(), "stored original image");
        Ok(original_web_path(&file_name))
    }
}

/// `{prefix}_{uuid v4}.png`
pub fn unique_file_name(prefix: &str) -> String {
    format!("{prefix}_{}.png", Uuid::new_v4().simple())
}

/// Decode `data:<mime>;base64,<payload>`.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, GalleryError> {
    let (header, encoded) = url.split_once(',').ok_or(GalleryError::MalformedDataUrl)?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(GalleryError::MalformedDataUrl);
    }
    decode_inline(encoded)
}

fn decode_inline(encoded: &str) -> Result<Vec<u8>, GalleryError> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(GalleryError::EmptyPayload);
    }
    Ok(STANDARD.decode(encoded)?)
}
