use crate::error::GalleryError;
use crate::service::content::{ContentRoot, thumbnail_path_for};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Bounding box of generated thumbnails.
pub const THUMBNAIL_MAX_WIDTH: u32 = 200;
pub const THUMBNAIL_MAX_HEIGHT: u32 = 200;
pub const THUMBNAIL_JPEG_QUALITY: u8 = 80;

/// Lazily derived previews stored next to the originals.
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    content: ContentRoot,
}

impl ThumbnailCache {
    pub fn new(content: ContentRoot) -> Self {
        Self { content }
    }

    /// Return the thumbnail web path for `image_path`, generating the file if
    /// it does not exist yet. Existing thumbnails are never regenerated.
    /// `None` when no thumbnail could be produced; the failure is logged.
    pub async fn ensure_thumbnail(&self, image_path: &str) -> Option<String> {
        let thumb_web = thumbnail_path_for(image_path);
        let Some(thumb_fs) = self.content.resolve(&thumb_web) else {
            warn!(image_path, "thumbnail path is outside the content root");
            return None;
        };
        if tokio::fs::try_exists(&thumb_fs).await.unwrap_or(false) {
            return Some(thumb_web);
        }
        let Some(original_fs) = self.content.resolve_original(image_path) else {
            warn!(image_path, "original path is outside the content root");
            return None;
        };

        match self.generate(original_fs, thumb_fs).await {
            Ok(()) => {
                debug!(image_path, thumbnail = %thumb_web, "generated thumbnail");
                Some(thumb_web)
            }
            Err(e) => {
                warn!(image_path, error = %e, "error generating thumbnail");
                None
            }
        }
    }

    async fn generate(&self, original: PathBuf, thumbnail: PathBuf) -> Result<(), GalleryError> {
        if let Some(parent) = thumbnail.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let encoded = tokio::task::spawn_blocking(move || render_thumbnail(&original))
            .await
            .map_err(|e| GalleryError::Task(e.to_string()))??;
        tokio::fs::write(&thumbnail, encoded).await?;
        Ok(())
    }
}

/// Decode, flatten to RGB, shrink to fit the bounding box and encode as JPEG.
pub fn render_thumbnail(original: &Path) -> Result<Vec<u8>, GalleryError> {
    let img = ImageReader::open(original)?.with_guessed_format()?.decode()?;

    // alpha and palettes are dropped, not composited
    let mut rgb = img.to_rgb8();
    if rgb.width() > THUMBNAIL_MAX_WIDTH || rgb.height() > THUMBNAIL_MAX_HEIGHT {
        let (w, h) = fit_within(
            rgb.width(),
            rgb.height(),
            THUMBNAIL_MAX_WIDTH,
            THUMBNAIL_MAX_HEIGHT,
        );
        rgb = image::imageops::resize(&rgb, w, h, FilterType::Lanczos3);
    }

    let mut out = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut out, THUMBNAIL_JPEG_QUALITY);
    encoder.encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8.into(),
    )?;
    Ok(out.into_inner())
}

/// Largest size with the same aspect ratio that fits the box, at least 1×1.
fn fit_within(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let scale = f64::min(max_w as f64 / width as f64, max_h as f64 / height as f64);
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_w);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_h);
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn open_sniffed(path: &Path) -> image::DynamicImage {
        ImageReader::open(path)
            .unwrap()
            .with_guessed_format()
            .unwrap()
            .decode()
            .unwrap()
    }

    fn write_png(content: &ContentRoot, name: &str, w: u32, h: u32) -> String {
        std::fs::create_dir_all(content.originals_dir()).unwrap();
        let img = RgbaImage::from_pixel(w, h, Rgba([200, 10, 10, 128]));
        img.save_with_format(content.originals_dir().join(name), ImageFormat::Png)
            .unwrap();
        format!("/static/generated_images/{name}")
    }

    #[test]
    fn fit_within_preserves_aspect_ratio() {
        assert_eq!(fit_within(1024, 1024, 200, 200), (200, 200));
        assert_eq!(fit_within(1792, 1024, 200, 200), (200, 114));
        assert_eq!(fit_within(1024, 1792, 200, 200), (114, 200));
        assert_eq!(fit_within(10_000, 1, 200, 200), (200, 1));
    }

    #[tokio::test]
    async fn generates_bounded_jpeg_and_never_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let content = ContentRoot::new(dir.path());
        let cache = ThumbnailCache::new(content.clone());
        let original = write_png(&content, "wide.png", 400, 100);

        let first = cache.ensure_thumbnail(&original).await.expect("thumbnail");
        assert_eq!(first, "/static/thumbnails/thumb_wide.png");
        let thumb_fs = content.resolve(&first).unwrap();
        let thumb = open_sniffed(&thumb_fs);
        assert_eq!((thumb.width(), thumb.height()), (200, 50));
        assert_eq!(
            ImageReader::open(&thumb_fs)
                .unwrap()
                .with_guessed_format()
                .unwrap()
                .format(),
            Some(ImageFormat::Jpeg)
        );

        // overwrite with a marker; a regeneration would replace it
        std::fs::write(&thumb_fs, b"marker").unwrap();
        let second = cache.ensure_thumbnail(&original).await.expect("thumbnail");
        assert_eq!(second, first);
        assert_eq!(std::fs::read(&thumb_fs).unwrap(), b"marker");
    }

    #[tokio::test]
    async fn small_images_are_not_upscaled() {
        let dir = tempfile::tempdir().unwrap();
        let content = ContentRoot::new(dir.path());
        let cache = ThumbnailCache::new(content.clone());
        let original = write_png(&content, "tiny.png", 40, 20);

        let thumb = cache.ensure_thumbnail(&original).await.unwrap();
        let img = open_sniffed(&content.resolve(&thumb).unwrap());
        assert_eq!((img.width(), img.height()), (40, 20));
    }

    #[tokio::test]
    async fn corrupt_or_missing_originals_yield_none() {
        let dir = tempfile::tempdir().unwrap();
        let content = ContentRoot::new(dir.path());
        std::fs::create_dir_all(content.originals_dir()).unwrap();
        std::fs::write(content.originals_dir().join("broken.png"), b"not an image").unwrap();
        let cache = ThumbnailCache::new(content.clone());

        assert_eq!(
            cache
                .ensure_thumbnail("/static/generated_images/broken.png")
                .await,
            None
        );
        assert_eq!(
            cache
                .ensure_thumbnail("/static/generated_images/missing.png")
                .await,
            None
        );
        assert_eq!(cache.ensure_thumbnail("/etc/passwd").await, None);
    }
}
