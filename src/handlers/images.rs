use axum::{
    Json,
    extract::{Multipart, Query, State, rejection::JsonRejection},
    http::header,
    response::IntoResponse,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::api::ImageApi;
use crate::db::models::format_timestamp;
use crate::db::{ImageFilter, NewImage};
use crate::error::GalleryError;
use crate::middleware::session::{current_session, ensure_session};
use crate::router::GalleryState;
use crate::service::gallery::GalleryPage;
use crate::service::ingest::FILENAME_PREFIX;
use crate::service::{GalleryScope, PageRequest};
use crate::types::images::GenerationRequest;

pub const DEFAULT_SIZE: &str = "1024x1024";
pub const DEFAULT_QUALITY: &str = "standard";
pub const MAX_IMAGES_PER_REQUEST: i64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateImageBody {
    #[serde(default)]
    pub prompt: String,
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub n: Option<i64>,
    pub size: Option<String>,
    pub quality: Option<String>,
}

/// Accepts `2`, `2.0` and `"2"`. Fractional or non-numeric values are rejected.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    let invalid = || <D::Error as serde::de::Error>::custom("n must be an integer");
    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Int(n)) => Ok(Some(n)),
        Some(Raw::Float(f)) if f.fract() == 0.0 && f.abs() <= i64::MAX as f64 => {
            Ok(Some(f as i64))
        }
        Some(Raw::Float(_)) => Err(invalid()),
        Some(Raw::Text(s)) => s.trim().parse().map(Some).map_err(|_| invalid()),
    }
}

/// Image as shown in a user's own history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageDescriptor {
    pub prompt: String,
    pub model: String,
    pub size: String,
    pub quality: Option<String>,
    pub image_path: String,
    pub timestamp: String,
}

impl From<&NewImage> for ImageDescriptor {
    fn from(img: &NewImage) -> Self {
        Self {
            prompt: img.prompt.clone(),
            model: img.model.clone(),
            size: img.size.clone(),
            quality: img.quality.clone(),
            image_path: img.image_path.clone(),
            timestamp: format_timestamp(&img.timestamp),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub models: Vec<String>,
    #[serde(flatten)]
    pub page: GalleryPage,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateImageResponse {
    pub images: Vec<ImageDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub message: String,
    pub imported_count: usize,
}

/// The configured models and one page of the caller's own images, newest
/// first, with thumbnails. Without a session the page is empty.
pub async fn history_handler(
    State(state): State<GalleryState>,
    jar: PrivateCookieJar,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, GalleryError> {
    let req = PageRequest::parse(query.page.as_deref(), query.per_page.as_deref());
    let page = match current_session(&jar) {
        Some(sid) => {
            state
                .gallery
                .page(&GalleryScope::Session(sid), &ImageFilter::default(), req)
                .await?
        }
        None => GalleryPage::empty(req),
    };
    Ok(Json(HistoryResponse {
        models: state.config.openai_models.clone(),
        page,
    }))
}

pub async fn generate_image_handler(
    State(state): State<GalleryState>,
    jar: PrivateCookieJar,
    payload: Result<Json<GenerateImageBody>, JsonRejection>,
) -> Result<(PrivateCookieJar, Json<GenerateImageResponse>), GalleryError> {
    let Json(body) = payload?;
    let request = build_generation_request(&state, body)?;
    let (jar, session_id) = ensure_session(jar, state.secure_cookies());

    let response = ImageApi::generate(
        &state.client,
        &state.config.openai_api_endpoint,
        &state.config.openai_api_key,
        &request,
    )
    .await?;

    let stored = state
        .ingestor
        .ingest_batch(&response.data, FILENAME_PREFIX)
        .await;

    let timestamp = Utc::now();
    let mut images = Vec::with_capacity(stored.len());
    for item in stored {
        let row = NewImage {
            session_id: session_id.clone(),
            prompt: request.prompt.clone(),
            model: request.model.clone(),
            size: request.size.clone(),
            quality: request.quality.clone(),
            response_format: item.response_format,
            image_path: item.image_path,
            timestamp,
        };
        state.storage.insert(&row).await?;
        images.push(ImageDescriptor::from(&row));
    }

    info!(
        model = %request.model,
        requested = request.n,
        stored = images.len(),
        "generated images"
    );
    Ok((jar, Json(GenerateImageResponse { images })))
}

/// Validate the body and fill in defaults.
fn build_generation_request(
    state: &GalleryState,
    body: GenerateImageBody,
) -> Result<GenerationRequest, GalleryError> {
    let prompt = body.prompt.trim();
    if prompt.is_empty() {
        return Err(GalleryError::Validation("Prompt is required".to_string()));
    }

    let config = &state.config;
    let model = match body.model.filter(|m| !m.is_empty()) {
        Some(m) => m,
        None => config
            .default_model()
            .ok_or_else(|| GalleryError::Validation("No image models are configured".to_string()))?
            .to_string(),
    };
    if !config.is_known_model(&model) {
        return Err(GalleryError::Validation(format!("Unsupported model: {model}")));
    }

    let n = body.n.unwrap_or(1);
    if !(1..=MAX_IMAGES_PER_REQUEST).contains(&n) {
        return Err(GalleryError::Validation(format!(
            "n must be between 1 and {MAX_IMAGES_PER_REQUEST}"
        )));
    }

    let size = body
        .size
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SIZE.to_string());
    let quality = config.takes_quality(&model).then(|| {
        body.quality
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| DEFAULT_QUALITY.to_string())
    });

    Ok(GenerationRequest {
        model,
        prompt: prompt.to_string(),
        n: n as u32,
        size,
        quality,
    })
}

/// Download the caller's history as a JSON attachment.
pub async fn export_session_handler(
    State(state): State<GalleryState>,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, GalleryError> {
    let session_id = current_session(&jar).ok_or(GalleryError::NoSession)?;
    let exported = state.history.export(&session_id).await?;

    let disposition = format!("attachment; filename=\"{}\"", exported.download_name);
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        exported.document,
    ))
}

/// Re-import a previously exported document into the caller's session.
pub async fn import_session_handler(
    State(state): State<GalleryState>,
    jar: PrivateCookieJar,
    mut multipart: Multipart,
) -> Result<(PrivateCookieJar, Json<ImportResponse>), GalleryError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(GalleryError::Validation("No file selected".to_string()));
        }
        upload = Some(field.bytes().await?);
        break;
    }
    let document =
        upload.ok_or_else(|| GalleryError::Validation("No file provided".to_string()))?;

    let (jar, session_id) = ensure_session(jar, state.secure_cookies());
    let imported_count = state.history.import(&session_id, &document).await?;

    Ok((
        jar,
        Json(ImportResponse {
            message: format!("Successfully imported {imported_count} images"),
            imported_count,
        }),
    ))
}
