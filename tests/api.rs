//! HTTP-level tests for the generator routes.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use image::{Rgba, RgbaImage};
use tower::ServiceExt;

use qr_art::config::Config;
use qr_art::render::{
    BlendRenderer, ErrorLevel, QrArtRenderer, RenderError, RenderJob, RenderedQr,
};
use qr_art::routes::{app, AppState};
use qr_art::validate::OutputFormat;

const BOUNDARY: &str = "qr-art-test-boundary";

/// Writes a 40x20 image instead of rendering, and counts its calls.
#[derive(Default)]
struct FakeRenderer {
    calls: AtomicUsize,
}

impl QrArtRenderer for FakeRenderer {
    fn render(&self, job: &RenderJob<'_>) -> Result<RenderedQr, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = job.save_dir.join(job.save_name);
        let img = RgbaImage::from_pixel(40, 20, Rgba([0, 0, 0, 255]));
        match OutputFormat::from_path(&path) {
            OutputFormat::Gif => qr_art::frames::write_gif(&path, [image::Frame::new(img)])?,
            OutputFormat::Png => img.save(&path)?,
        }
        Ok(RenderedQr {
            version: 4,
            level: job.options.level,
            path,
        })
    }
}

struct BrokenRenderer;

impl QrArtRenderer for BrokenRenderer {
    fn render(&self, _job: &RenderJob<'_>) -> Result<RenderedQr, RenderError> {
        Err(RenderError::Version(99))
    }
}

fn config(root: &Path) -> Config {
    Config {
        scratch_root: root.to_path_buf(),
        target_width: 200,
        ..Config::default()
    }
}

fn state_with(root: &Path, renderer: Arc<dyn QrArtRenderer>) -> Arc<AppState> {
    Arc::new(AppState::new(config(root), renderer))
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart(parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/generate-qr")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    RgbaImage::from_fn(w, h, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 120, 255]))
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    hyper::body::to_bytes(response.into_body())
        .await
        .unwrap()
        .to_vec()
}

async fn detail(response: Response) -> String {
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    json["detail"].as_str().unwrap().to_string()
}

fn scratch_dirs(root: &Path) -> usize {
    std::fs::read_dir(root)
        .map(|entries| entries.flatten().count())
        .unwrap_or(0)
}

#[tokio::test]
async fn root_lists_endpoints() {
    let root = tempfile::tempdir().unwrap();
    let app = app(state_with(root.path(), Arc::new(FakeRenderer::default())));

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["message"], "Artistic QR Code Generator API");
    assert!(json["endpoints"]["/generate-qr"].is_string());
}

#[tokio::test]
async fn health_is_fixed() {
    let root = tempfile::tempdir().unwrap();
    let app = app(state_with(root.path(), Arc::new(FakeRenderer::default())));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, br#"{"status":"healthy"}"#);
}

#[tokio::test]
async fn ui_serves_the_form() {
    let root = tempfile::tempdir().unwrap();
    let app = app(state_with(root.path(), Arc::new(FakeRenderer::default())));

    let response = app
        .oneshot(Request::get("/ui").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("/generate-qr"));
    assert!(html.contains("Colorized"));
}

#[tokio::test]
async fn png_upload_returns_upscaled_png() {
    let root = tempfile::tempdir().unwrap();
    let renderer = Arc::new(FakeRenderer::default());
    let app = app(state_with(root.path(), renderer.clone()));

    let response = app
        .oneshot(multipart(&[
            Part::Text("payload", "https://example.com"),
            Part::File("image", "logo.png", &png_bytes(10, 10)),
            Part::Text("colorized", "true"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"artistic_qrcode.png\""
    );
    assert_eq!(headers["x-qr-version"], "4");
    assert_eq!(headers["x-qr-level"], "H");

    let img = image::load_from_memory(&body_bytes(response).await).unwrap();
    assert_eq!((img.width(), img.height()), (200, 100));
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(scratch_dirs(root.path()), 0);
}

#[tokio::test]
async fn gif_upload_returns_gif() {
    let root = tempfile::tempdir().unwrap();
    let app = app(state_with(root.path(), Arc::new(FakeRenderer::default())));

    let response = app
        .oneshot(multipart(&[
            Part::Text("payload", "hello"),
            Part::File("image", "anim.GIF", b"GIF89a"),
            Part::Text("level", "q"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/gif");
    assert_eq!(response.headers()["x-qr-level"], "Q");
    assert!(body_bytes(response).await.starts_with(b"GIF8"));
}

#[tokio::test]
async fn blank_payload_is_rejected_before_staging() {
    let root = tempfile::tempdir().unwrap();
    let renderer = Arc::new(FakeRenderer::default());
    let app = app(state_with(root.path(), renderer.clone()));

    let response = app
        .oneshot(multipart(&[
            Part::Text("payload", "   "),
            Part::File("image", "logo.png", &png_bytes(4, 4)),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(detail(response).await, "Payload cannot be empty");
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(scratch_dirs(root.path()), 0);
}

#[tokio::test]
async fn disallowed_extension_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let app = app(state_with(root.path(), Arc::new(FakeRenderer::default())));

    let response = app
        .oneshot(multipart(&[
            Part::Text("payload", "hello"),
            Part::File("image", "logo.bmp", b"BM"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        detail(response).await,
        "Invalid file type. Allowed types: .jpg, .jpeg, .png, .gif"
    );
}

#[tokio::test]
async fn missing_fields_are_unprocessable() {
    let root = tempfile::tempdir().unwrap();

    let response = app(state_with(root.path(), Arc::new(FakeRenderer::default())))
        .oneshot(multipart(&[Part::File("image", "logo.png", b"x")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app(state_with(root.path(), Arc::new(FakeRenderer::default())))
        .oneshot(multipart(&[Part::Text("payload", "hello")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(detail(response).await, "Missing required field: image");
}

#[tokio::test]
async fn renderer_failure_is_a_server_error_and_cleans_up() {
    let root = tempfile::tempdir().unwrap();
    let app = app(state_with(root.path(), Arc::new(BrokenRenderer)));

    let response = app
        .oneshot(multipart(&[
            Part::Text("payload", "hello"),
            Part::File("image", "logo.jpg", b"jpeg-ish"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(detail(response)
        .await
        .starts_with("QR code generation failed: "));
    assert_eq!(scratch_dirs(root.path()), 0);
}

#[tokio::test]
async fn keep_scratch_leaves_the_directory() {
    let root = tempfile::tempdir().unwrap();
    let state = Arc::new(AppState::new(
        Config {
            keep_scratch: true,
            ..config(root.path())
        },
        Arc::new(FakeRenderer::default()),
    ));

    let response = app(state)
        .oneshot(multipart(&[
            Part::Text("payload", "hello"),
            Part::File("image", "logo.png", &png_bytes(4, 4)),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let dirs: Vec<_> = std::fs::read_dir(root.path()).unwrap().flatten().collect();
    assert_eq!(dirs.len(), 1);
    let dir = dirs[0].path();
    assert!(dir.join("input.png").is_file());
    assert!(dir.join("artistic_qrcode.png").is_file());
}

#[tokio::test]
async fn concurrent_requests_do_not_interfere() {
    let root = tempfile::tempdir().unwrap();
    let state = state_with(root.path(), Arc::new(FakeRenderer::default()));

    let requests = ["one", "two", "three", "four"].map(|payload| {
        let app = app(state.clone());
        async move {
            app.oneshot(multipart(&[
                Part::Text("payload", payload),
                Part::File("image", "logo.png", &png_bytes(6, 6)),
            ]))
            .await
            .unwrap()
        }
    });

    let [a, b, c, d] = requests;
    let (a, b, c, d) = tokio::join!(a, b, c, d);
    for response in [a, b, c, d] {
        assert_eq!(response.status(), StatusCode::OK);
        let img = image::load_from_memory(&body_bytes(response).await).unwrap();
        assert_eq!(img.width(), 200);
    }
    assert_eq!(scratch_dirs(root.path()), 0);
}

#[tokio::test]
async fn real_renderer_produces_full_width_square() {
    let root = tempfile::tempdir().unwrap();
    let state = Arc::new(AppState::new(
        Config {
            scratch_root: root.path().to_path_buf(),
            ..Config::default()
        },
        Arc::new(BlendRenderer),
    ));

    let response = app(state)
        .oneshot(multipart(&[
            Part::Text("payload", "https://example.com"),
            Part::File("image", "logo.png", &png_bytes(500, 500)),
            Part::Text("colorized", "true"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-qr-level"], ErrorLevel::H.as_str());
    let img = image::load_from_memory(&body_bytes(response).await).unwrap();
    assert_eq!((img.width(), img.height()), (2048, 2048));
}
