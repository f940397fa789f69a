#![allow(dead_code)]

use axum::{
    Json, Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
    routing::{get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageFormat, Rgba, RgbaImage};
use pixelvault::config::Config;
use pixelvault::router::{GalleryState, gallery_router};
use serde_json::{Value, json};
use std::io::Cursor;
use std::net::SocketAddr;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tower::ServiceExt;
use url::Url;

pub const ADMIN_PASSWORD: &str = "open-sesame";
pub const BOUNDARY: &str = "pixelvault-test-boundary";

pub struct TestApp {
    pub dir: TempDir,
    pub state: GalleryState,
    pub app: Router,
}

impl TestApp {
    pub async fn new(provider_endpoint: Url) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");

        let mut cfg = Config::default();
        cfg.database_path = dir.path().join("images.db");
        cfg.static_dir = dir.path().join("static");
        cfg.session_file_dir = dir.path().join("sessions");
        cfg.secret_key = Some("k".repeat(64));
        cfg.insecure_cookie = true;
        cfg.openai_api_key = "test-key".to_string();
        cfg.openai_api_endpoint = provider_endpoint;
        cfg.admin_password = Some(ADMIN_PASSWORD.to_string());
        cfg.request_timeout_secs = 10;

        let state = GalleryState::new(cfg)
            .await
            .expect("failed to build gallery state");
        let app = gallery_router(state.clone());
        Self { dir, state, app }
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.expect("request failed")
    }

    pub fn originals_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("static").join("generated_images")
    }

    pub fn thumbnails_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("static").join("thumbnails")
    }

    /// Filesystem path of a `/static/...` web path.
    pub fn fs_path(&self, web_path: &str) -> std::path::PathBuf {
        let rel = web_path
            .strip_prefix("/static/")
            .expect("web path outside /static");
        self.dir.path().join("static").join(rel)
    }
}

pub fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(w, h, Rgba([20, 120, 220, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("failed to encode png");
    out.into_inner()
}

/// Local stand-in for the image provider and a remote image host.
///
/// * `POST /v1/images/generations` returns three items: an inline base64
///   image, a malformed data URL and a URL pointing back at `/files/remote.png`.
/// * `POST /v1/reject` answers 400 with a provider error body.
pub async fn spawn_provider() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind stub provider");
    let addr = listener.local_addr().expect("no local addr");

    let app = Router::new()
        .route(
            "/v1/images/generations",
            post(move |Json(body): Json<Value>| async move {
                assert!(body["prompt"].is_string());
                let inline = STANDARD.encode(png_bytes(300, 300));
                Json(json!({
                    "data": [
                        { "b64_json": inline, "revised_prompt": "a revised prompt" },
                        { "url": "data:image/png;base64,%%%not-base64%%%" },
                        { "url": format!("http://{addr}/files/remote.png") },
                    ]
                }))
            }),
        )
        .route(
            "/v1/reject",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    r#"{"error":{"message":"prompt rejected by safety system"}}"#,
                )
            }),
        )
        .route(
            "/files/remote.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], png_bytes(64, 32)) }),
        );

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub provider failed");
    });
    addr
}

pub fn provider_url(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{addr}{path}")).expect("invalid stub url")
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&body).expect("response body was not JSON")
}

/// `name=value` of the session cookie set by a response, if any.
pub fn session_cookie(resp: &Response<Body>) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("sid="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub fn generate_request(cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/generate_image")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("failed to build request")
}

pub fn multipart_body(field: &str, file_name: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/json\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn import_request(cookie: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/import_session")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(body))
        .expect("failed to build request")
}
