use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::error::RequestError;
use crate::models::{AliasResponse, ImagePayload};
use crate::pipeline::AliasPipeline;

pub const MAX_IMAGE_BYTES: usize = 10 << 20;
const FORM_OVERHEAD_BYTES: usize = 64 << 10;
const IMAGE_FIELD: &str = "image";
const API_KEY_PARAM: &str = "api_key";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AliasPipeline>,
    /// Cancelled on shutdown; each request runs under a child token.
    pub shutdown: CancellationToken,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/imageProcessor",
            post(image_processor).fallback(method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + FORM_OVERHEAD_BYTES))
        .with_state(state)
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = match self {
            RequestError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RequestError::InvalidForm | RequestError::MissingImage => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn method_not_allowed() -> RequestError {
    RequestError::MethodNotAllowed
}

async fn image_processor(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    form: Result<Multipart, MultipartRejection>,
) -> Response {
    let image = match read_image(form).await {
        Ok(image) => image,
        Err(e) => return e.into_response(),
    };

    tracing::info!("processing image ({} bytes)", image.bytes.len());
    let api_key = api_key_from_query(query.as_deref());
    let cancel = state.shutdown.child_token();
    match state
        .pipeline
        .extract_alias(&image, api_key.as_deref(), &cancel)
        .await
    {
        Ok(alias) => (StatusCode::OK, Json(AliasResponse { alias })).into_response(),
        Err(e) => {
            tracing::error!("image processing failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// First `api_key` value in the query string. Repeats and unrelated
/// parameters are ignored; malformed pairs are decoded leniently.
fn api_key_from_query(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == API_KEY_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Pull the `image` file part out of the form. Other fields are skipped.
async fn read_image(
    form: Result<Multipart, MultipartRejection>,
) -> Result<ImagePayload, RequestError> {
    let mut form = form.map_err(|_| RequestError::InvalidForm)?;
    loop {
        let field = match form.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(RequestError::MissingImage),
            Err(_) => return Err(RequestError::InvalidForm),
        };
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        // Plain text fields named `image` are not file uploads.
        if field.file_name().is_none() {
            return Err(RequestError::MissingImage);
        }
        let bytes = field.bytes().await.map_err(|_| RequestError::InvalidForm)?;
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(RequestError::InvalidForm);
        }
        return Ok(ImagePayload::png(bytes.to_vec()));
    }
}
