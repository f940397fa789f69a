mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, TimeZone, Utc};
use common::*;
use pixelvault::db::{ImageFilter, NewImage, ResponseFormat};
use pixelvault::service::{GalleryScope, PageRequest};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::Path;

fn row(session: &str, prompt: &str, model: &str, minute: i64) -> NewImage {
    NewImage {
        session_id: session.to_string(),
        prompt: prompt.to_string(),
        model: model.to_string(),
        size: "1024x1024".to_string(),
        quality: None,
        response_format: ResponseFormat::B64Json,
        image_path: format!("/static/generated_images/{session}_{minute}.png"),
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minute),
    }
}

fn admin_uri(query: &str) -> String {
    format!("/admin?password={ADMIN_PASSWORD}&{query}")
}

fn delete_request(id: i64, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/admin/delete_image/{id}?password={password}"))
        .body(Body::empty())
        .expect("failed to build request")
}

fn tree(dir: &Path) -> BTreeSet<String> {
    walk(dir, dir)
}

fn walk(root: &Path, dir: &Path) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            out.extend(walk(root, &path));
        } else {
            out.insert(path.strip_prefix(root).unwrap().display().to_string());
        }
    }
    out
}

#[tokio::test]
async fn admin_requires_password() {
    let provider = spawn_provider().await;
    let t = TestApp::new(provider_url(provider, "/v1/images/generations")).await;

    for uri in ["/admin", "/admin?password=wrong", "/admin?password="] {
        let resp = t.send(get_request(uri, None)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body_json(resp).await["error"]["message"], "Unauthorized access");
    }

    let resp = t.send(delete_request(1, "wrong")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = t.send(get_request(&admin_uri(""), None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_pagination_over_45_rows() {
    let provider = spawn_provider().await;
    let t = TestApp::new(provider_url(provider, "/v1/images/generations")).await;
    let rows: Vec<NewImage> = (0..45).map(|i| row("s1", "prompt", "dall-e-3", i)).collect();
    t.state.storage.insert_many(&rows).await.unwrap();

    let page1 = body_json(t.send(get_request(&admin_uri("per_page=20"), None)).await).await;
    assert_eq!(page1["total_count"], 45);
    assert_eq!(page1["total_pages"], 3);
    assert_eq!(page1["current_page"], 1);
    assert_eq!(page1["images"].as_array().unwrap().len(), 20);
    // newest first
    assert_eq!(
        page1["images"][0]["image_path"],
        "/static/generated_images/s1_44.png"
    );
    // originals are missing, so the listing falls back to them
    assert_eq!(
        page1["images"][0]["thumbnail_path"],
        page1["images"][0]["image_path"]
    );

    let page3 = body_json(t.send(get_request(&admin_uri("page=3&per_page=20"), None)).await).await;
    assert_eq!(page3["images"].as_array().unwrap().len(), 5);
    assert_eq!(
        page3["images"][4]["image_path"],
        "/static/generated_images/s1_0.png"
    );

    let page4 = body_json(t.send(get_request(&admin_uri("page=4&per_page=20"), None)).await).await;
    assert_eq!(page4["images"], json!([]));
    assert_eq!(page4["total_pages"], 3);

    let page0 = body_json(t.send(get_request(&admin_uri("page=0"), None)).await).await;
    assert_eq!(page0["current_page"], 1);
    assert_eq!(page0["per_page"], 20);
}

#[tokio::test]
async fn admin_filters_are_conjunctive() {
    let provider = spawn_provider().await;
    let t = TestApp::new(provider_url(provider, "/v1/images/generations")).await;
    let rows = vec![
        row("alpha", "a red fox", "dall-e-3", 0),
        row("alpha", "a red car", "dall-e-2", 1),
        row("alpha", "blue fox", "dall-e-3", 2),
        row("beta", "a red fox", "dall-e-3", 3),
        row("beta", "100% red_fox", "dall-e-3", 4),
    ];
    t.state.storage.insert_many(&rows).await.unwrap();

    let body = body_json(
        t.send(get_request(
            &admin_uri("session_id=alpha&model=dall-e-3&prompt=red"),
            None,
        ))
        .await,
    )
    .await;
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["images"][0]["prompt"], "a red fox");
    assert_eq!(body["images"][0]["session_id"], "alpha");
    assert_eq!(
        body["filters"],
        json!({ "session_id": "alpha", "prompt": "red", "model": "dall-e-3" })
    );
    assert_eq!(body["session_id_list"], json!(["alpha", "beta"]));
    assert_eq!(body["model_list"], json!(["dall-e-2", "dall-e-3"]));

    // empty values mean no filter
    let body = body_json(
        t.send(get_request(&admin_uri("session_id=&model=&prompt="), None))
            .await,
    )
    .await;
    assert_eq!(body["total_count"], 5);

    // LIKE wildcards in the filter are literal
    let body = body_json(t.send(get_request(&admin_uri("prompt=red_fox"), None)).await).await;
    assert_eq!(body["total_count"], 1);
    let body = body_json(t.send(get_request(&admin_uri("prompt=100%25"), None)).await).await;
    assert_eq!(body["total_count"], 1);
}

#[tokio::test]
async fn session_scope_overrides_session_filter() {
    let provider = spawn_provider().await;
    let t = TestApp::new(provider_url(provider, "/v1/images/generations")).await;
    let rows = vec![
        row("mine", "one", "dall-e-3", 0),
        row("mine", "two", "dall-e-3", 1),
        row("theirs", "three", "dall-e-3", 2),
    ];
    t.state.storage.insert_many(&rows).await.unwrap();

    let page = t
        .state
        .gallery
        .page(
            &GalleryScope::Session("mine".to_string()),
            &ImageFilter::for_session("theirs"),
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total_count, 2);
    assert!(page.images.iter().all(|i| i.session_id == "mine"));
    assert_eq!(page.images[0].prompt, "two");
}

#[tokio::test]
async fn delete_removes_row_original_and_thumbnail() {
    let provider = spawn_provider().await;
    let t = TestApp::new(provider_url(provider, "/v1/images/generations")).await;

    let resp = t
        .send(generate_request(None, json!({ "prompt": "to be deleted" })))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // the listing materializes thumbnails
    let listing = body_json(t.send(get_request(&admin_uri(""), None)).await).await;
    let images = listing["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    let target = &images[0];
    let id = target["id"].as_i64().unwrap();
    let original = t.fs_path(target["image_path"].as_str().unwrap());
    let thumbnail = t.fs_path(target["thumbnail_path"].as_str().unwrap());
    assert!(target["thumbnail_path"]
        .as_str()
        .unwrap()
        .starts_with("/static/thumbnails/thumb_"));
    assert!(original.is_file());
    assert!(thumbnail.is_file());
    let thumb = image::ImageReader::open(&thumbnail)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .decode()
        .unwrap();
    assert!(thumb.width() <= 200 && thumb.height() <= 200);

    let resp = t.send(delete_request(id, ADMIN_PASSWORD)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!({ "success": true, "message": "Image deleted successfully" })
    );
    assert!(t.state.storage.get(id).await.unwrap().is_none());
    assert!(!original.exists());
    assert!(!thumbnail.exists());

    // unknown ids leave the content root untouched
    let before = tree(&t.dir.path().join("static"));
    let resp = t.send(delete_request(id, ADMIN_PASSWORD)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(resp).await,
        json!({ "success": false, "message": "Image not found" })
    );
    assert_eq!(tree(&t.dir.path().join("static")), before);

    let listing = body_json(t.send(get_request(&admin_uri(""), None)).await).await;
    assert_eq!(listing["total_count"], 1);
}

#[tokio::test]
async fn delete_succeeds_when_files_are_already_gone() {
    let provider = spawn_provider().await;
    let t = TestApp::new(provider_url(provider, "/v1/images/generations")).await;
    let ids = t
        .state
        .storage
        .insert_many(&[row("s", "ghost", "dall-e-3", 0)])
        .await
        .unwrap();

    let resp = t.send(delete_request(ids[0], ADMIN_PASSWORD)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(t.state.storage.get(ids[0]).await.unwrap().is_none());
}
