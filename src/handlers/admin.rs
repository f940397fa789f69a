use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::db::ImageFilter;
use crate::error::GalleryError;
use crate::middleware::RequireAdmin;
use crate::router::GalleryState;
use crate::service::gallery::GalleryPage;
use crate::service::{GalleryScope, PageRequest};

/// Admin listing parameters. Everything arrives as text; empty values mean
/// "not given" and unparseable page numbers fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct AdminGalleryQuery {
    pub session_id: Option<String>,
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl AdminGalleryQuery {
    fn filter(&self) -> ImageFilter {
        ImageFilter {
            session_id: non_empty(&self.session_id),
            model: non_empty(&self.model),
            prompt: non_empty(&self.prompt),
        }
    }

    fn page_request(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref(), self.per_page.as_deref())
    }
}

fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Echo of the active filters, empty when unset.
#[derive(Debug, Serialize)]
pub struct AdminFilters {
    pub session_id: String,
    pub prompt: String,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct AdminGalleryResponse {
    #[serde(flatten)]
    pub page: GalleryPage,
    pub filters: AdminFilters,
    pub session_id_list: Vec<String>,
    pub model_list: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

pub async fn admin_gallery_handler(
    State(state): State<GalleryState>,
    _admin: RequireAdmin,
    Query(query): Query<AdminGalleryQuery>,
) -> Result<Json<AdminGalleryResponse>, GalleryError> {
    let filter = query.filter();
    let page = state
        .gallery
        .page(&GalleryScope::All, &filter, query.page_request())
        .await?;

    let session_id_list = state.storage.distinct_sessions().await?;
    let model_list = state.storage.distinct_models().await?;

    Ok(Json(AdminGalleryResponse {
        page,
        filters: AdminFilters {
            session_id: filter.session_id.unwrap_or_default(),
            prompt: filter.prompt.unwrap_or_default(),
            model: filter.model.unwrap_or_default(),
        },
        session_id_list,
        model_list,
    }))
}

/// Unknown ids answer 404 in the same `{success, message}` shape.
pub async fn delete_image_handler(
    State(state): State<GalleryState>,
    _admin: RequireAdmin,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<DeleteResponse>), GalleryError> {
    match state.gallery.delete(id).await {
        Ok(_) => Ok((
            StatusCode::OK,
            Json(DeleteResponse {
                success: true,
                message: "Image deleted successfully".to_string(),
            }),
        )),
        Err(GalleryError::NotFound(message)) => Ok((
            StatusCode::NOT_FOUND,
            Json(DeleteResponse {
                success: false,
                message,
            }),
        )),
        Err(e) => Err(e),
    }
}
