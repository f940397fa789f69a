use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::warn;

use crate::config::Config;
use crate::db::ImageStorage;
use crate::error::GalleryError;
use crate::handlers::admin::{admin_gallery_handler, delete_image_handler};
use crate::handlers::images::{
    export_session_handler, generate_image_handler, history_handler, import_session_handler,
};
use crate::service::{
    AdminAuthenticator, ContentRoot, Gallery, HistoryService, Ingestor, SharedSecret,
};

/// Upper bound for request bodies, history uploads included.
pub const BODY_LIMIT: usize = 16 * 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MIN_SECRET_KEY_LEN: usize = 32;

#[derive(Clone)]
pub struct GalleryState {
    pub config: Arc<Config>,
    pub storage: ImageStorage,
    pub client: reqwest::Client,
    pub ingestor: Ingestor,
    pub gallery: Gallery,
    pub history: HistoryService,
    pub admin_auth: Arc<dyn AdminAuthenticator>,
    cookie_key: Key,
}

impl GalleryState {
    /// Open the database, prepare the content directories and build the shared
    /// HTTP client.
    pub async fn new(config: Config) -> Result<Self, GalleryError> {
        let cookie_key = cookie_key(config.secret_key.as_deref())?;
        let storage = ImageStorage::open(&config.database_path).await?;

        let content = ContentRoot::new(&config.static_dir);
        content.ensure_dirs().await?;
        tokio::fs::create_dir_all(&config.session_file_dir).await?;

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.request_timeout())
            .build()?;

        let admin_auth: Arc<dyn AdminAuthenticator> =
            Arc::new(SharedSecret::new(config.admin_password.clone()));
        if config.admin_password.as_deref().is_none_or(str::is_empty) {
            warn!("admin_password is not set; admin endpoints will reject every request");
        }

        Ok(Self {
            ingestor: Ingestor::new(client.clone(), content.clone()),
            gallery: Gallery::new(storage.clone(), content.clone()),
            history: HistoryService::new(storage.clone(), content, &config.session_file_dir),
            config: Arc::new(config),
            storage,
            client,
            admin_auth,
            cookie_key,
        })
    }

    /// Replace the admin authenticator.
    pub fn with_admin_auth(mut self, auth: Arc<dyn AdminAuthenticator>) -> Self {
        self.admin_auth = auth;
        self
    }

    /// Whether session cookies carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        !self.config.insecure_cookie
    }
}

impl FromRef<GalleryState> for Key {
    fn from_ref(state: &GalleryState) -> Self {
        state.cookie_key.clone()
    }
}

fn cookie_key(secret: Option<&str>) -> Result<Key, GalleryError> {
    match secret.filter(|s| !s.is_empty()) {
        Some(s) if s.len() < MIN_SECRET_KEY_LEN => Err(GalleryError::Config(format!(
            "secret_key must be at least {MIN_SECRET_KEY_LEN} bytes"
        ))),
        Some(s) => Ok(Key::derive_from(s.as_bytes())),
        None => {
            warn!("secret_key is not set; sessions will not survive a restart");
            Ok(Key::generate())
        }
    }
}

pub fn gallery_router(state: GalleryState) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/history", get(history_handler))
        .route("/generate_image", post(generate_image_handler))
        .route("/export_session", get(export_session_handler))
        .route("/import_session", post(import_session_handler))
        .route("/admin", get(admin_gallery_handler))
        .route("/admin/delete_image/{id}", post(delete_image_handler))
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
