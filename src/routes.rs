use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Multipart},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{parse_bool, Config};
use crate::error::ApiError;
use crate::generator::{generate_artistic_qr, GeneratedQr, GenerationRequest};
use crate::models::{HealthResponse, ServiceInfo};
use crate::render::{ErrorLevel, QrArtRenderer, RenderOptions};
use crate::scratch::ScratchDir;
use crate::validate;

const UI_PAGE: &str = include_str!("../static/index.html");

/// Shared, read-only state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub renderer: Arc<dyn QrArtRenderer>,
}

impl AppState {
    pub fn new(config: Config, renderer: Arc<dyn QrArtRenderer>) -> Self {
        Self { config, renderer }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health))
        .route("/ui", get(get_ui))
        .route("/generate-qr", post(post_generate_qr))
        .layer(Extension(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn get_root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Artistic QR Code Generator API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: BTreeMap::from([
            ("/generate-qr", "POST - Generate artistic QR code"),
            ("/health", "GET - Health check"),
            ("/ui", "GET - Interactive generator form"),
        ]),
    })
}

async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

async fn get_ui() -> Html<&'static str> {
    Html(UI_PAGE)
}

#[derive(Debug)]
pub struct Upload {
    pub filename: String,
    pub bytes: Bytes,
}

/// The `POST /generate-qr` form after field-level parsing.
#[derive(Debug)]
pub struct GenerateForm {
    pub payload: String,
    pub image: Upload,
    pub colorized: bool,
    pub options: RenderOptions,
}

/// Raw multipart fields, collected before anything is interpreted.
#[derive(Debug, Default)]
pub struct RawForm {
    pub text: HashMap<String, String>,
    pub image: Option<Upload>,
}

impl RawForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| ApiError::BadRequest(format!("Malformed multipart body: {}", err)))?
        {
            let name = match field.name() {
                Some(name) => name.to_string(),
                None => continue,
            };

            if name == "image" {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::BadRequest("Improper bytes sent".to_string()))?;
                form.image = Some(Upload { filename, bytes });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|_| ApiError::Unprocessable(format!("Field {} is not text", name)))?;
                form.text.insert(name, value);
            }
        }

        Ok(form)
    }

    pub fn into_form(mut self) -> Result<GenerateForm, ApiError> {
        let payload = self
            .text
            .remove("payload")
            .ok_or(ApiError::MissingField("payload"))?;
        let image = self.image.take().ok_or(ApiError::MissingField("image"))?;

        let colorized = match self.text.get("colorized") {
            Some(value) => parse_bool(value).ok_or_else(|| {
                ApiError::Unprocessable(format!("colorized must be a boolean, got {:?}", value))
            })?,
            None => true,
        };

        let mut options = RenderOptions::default();
        if let Some(level) = self.optional("level") {
            options.level = level
                .parse::<ErrorLevel>()
                .map_err(ApiError::Unprocessable)?;
        }
        if let Some(version) = self.optional("version") {
            let version = version
                .parse::<i16>()
                .ok()
                .filter(|v| (1..=40).contains(v))
                .ok_or_else(|| {
                    ApiError::Unprocessable(format!("version must be 1..=40, got {:?}", version))
                })?;
            options.version = Some(version);
        }
        options.contrast = self.factor("contrast")?.unwrap_or(options.contrast);
        options.brightness = self.factor("brightness")?.unwrap_or(options.brightness);

        Ok(GenerateForm {
            payload,
            image,
            colorized,
            options,
        })
    }

    /// A text field that counts as absent when blank.
    fn optional(&self, name: &str) -> Option<&str> {
        self.text
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    fn factor(&self, name: &str) -> Result<Option<f32>, ApiError> {
        self.optional(name)
            .map(|value| {
                value
                    .parse::<f32>()
                    .ok()
                    .filter(|f| f.is_finite() && *f > 0.0)
                    .ok_or_else(|| {
                        ApiError::Unprocessable(format!(
                            "{} must be a positive number, got {:?}",
                            name, value
                        ))
                    })
            })
            .transpose()
    }
}

async fn post_generate_qr(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    // handler for POST /generate-qr

    let form = RawForm::read(multipart).await?.into_form()?;

    validate::validate_payload(&form.payload)?;
    let ext = validate::validate_extension(&form.image.filename)?;

    let scratch = ScratchDir::create(&state.config.scratch_root)
        .await
        .map_err(|err| ApiError::Internal(format!("Creating the scratch directory failed: {}", err)))?;

    let result = generate_in(&state, &scratch, &ext, form).await;

    if state.config.keep_scratch {
        tracing::debug!(path = %scratch.path().display(), "keeping scratch directory");
    } else {
        scratch.cleanup().await;
    }

    let (generated, bytes) = result?;
    artifact_response(&generated, bytes)
}

async fn generate_in(
    state: &Arc<AppState>,
    scratch: &ScratchDir,
    ext: &str,
    form: GenerateForm,
) -> Result<(GeneratedQr, Vec<u8>), ApiError> {
    let input = scratch
        .stage(ext, &form.image.bytes)
        .await
        .map_err(|err| ApiError::Internal(format!("Writing to file system failed: {}", err)))?;

    let renderer = Arc::clone(&state.renderer);
    let output_dir = scratch.path().to_path_buf();
    let target_width = state.config.target_width;

    let generated = tokio::task::spawn_blocking(move || {
        let mut request = GenerationRequest::new(&form.payload, &input, &output_dir);
        request.colorized = form.colorized;
        request.target_width = target_width;
        request.options = form.options;
        generate_artistic_qr(renderer.as_ref(), &request)
    })
    .await
    .map_err(|err| ApiError::Internal(format!("QR code generation failed: {}", err)))??;

    let bytes = tokio::fs::read(&generated.path)
        .await
        .map_err(|err| ApiError::Internal(format!("Reading the generated image failed: {}", err)))?;

    Ok((generated, bytes))
}

fn artifact_response(generated: &GeneratedQr, bytes: Vec<u8>) -> Result<Response, ApiError> {
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        generated.filename
    ))
    .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(generated.format.mime())),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::HeaderName::from_static("x-qr-version"),
                HeaderValue::from(generated.version),
            ),
            (
                header::HeaderName::from_static("x-qr-level"),
                HeaderValue::from_static(generated.level.as_str()),
            ),
        ],
        bytes,
    )
        .into_response())
}
