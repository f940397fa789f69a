use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::GalleryError;
use crate::router::GalleryState;

/// Admin password from the `password` query parameter.
pub fn presented_password(query: Option<&str>) -> Option<String> {
    let qs = query?;
    url::form_urlencoded::parse(qs.as_bytes())
        .find(|(k, _)| k == "password")
        .map(|(_, v)| v.into_owned())
}

/// Rejects the request with 401 unless it presents a valid admin password.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin;

impl FromRequestParts<GalleryState> for RequireAdmin {
    type Rejection = GalleryError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GalleryState,
    ) -> Result<Self, Self::Rejection> {
        let Some(password) = presented_password(parts.uri.query()) else {
            return Err(GalleryError::Unauthorized);
        };
        if !state.admin_auth.verify(&password) {
            return Err(GalleryError::Unauthorized);
        }
        Ok(Self)
    }
}
