//! Gemini REST transport: resumable file upload and `generateContent`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::error::{PipelineError, PipelineResult, Stage};
use crate::models::{Credential, FileReference, ImagePayload, Part, RawResponse};
use crate::session::{Content, ExtractionSession, SamplingPolicy};
use crate::vision::{VisionService, VisionSession, UPLOAD_DISPLAY_NAME};

// ── Constants ────────────────────────────────────────────────────────────────

const USER_AGENT: &str = "alias-extractor-api/1.0";
const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";
const UPLOAD_PATH: &str = "upload/v1beta/files";

// ── Service ──────────────────────────────────────────────────────────────────

pub struct GeminiService {
    base_url: Url,
}

impl GeminiService {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }
}

impl VisionService for GeminiService {
    fn name(&self) -> &str {
        "gemini"
    }

    fn connect(&self, credential: &Credential) -> PipelineResult<Box<dyn VisionSession>> {
        let mut key = HeaderValue::from_str(credential.expose()).map_err(|_| {
            PipelineError::upstream(Stage::Upload, "API key is not a valid header value", None)
        })?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);

        let client = reqwest::ClientBuilder::new()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| PipelineError::transport(Stage::Upload, e))?;

        Ok(Box::new(GeminiSession {
            client,
            base_url: self.base_url.clone(),
        }))
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

struct GeminiSession {
    client: reqwest::Client,
    base_url: Url,
}

impl GeminiSession {
    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!("{}/{}", url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        url
    }
}

#[async_trait]
impl VisionSession for GeminiSession {
    async fn upload(&self, payload: &ImagePayload) -> PipelineResult<FileReference> {
        let start = self
            .client
            .post(self.endpoint(UPLOAD_PATH))
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header(
                "X-Goog-Upload-Header-Content-Length",
                payload.bytes.len().to_string(),
            )
            .header("X-Goog-Upload-Header-Content-Type", &payload.mime_type)
            .json(&UploadStart {
                file: UploadMetadata {
                    display_name: UPLOAD_DISPLAY_NAME,
                },
            })
            .send()
            .await
            .map_err(|e| PipelineError::transport(Stage::Upload, e))?;
        let start = check_status(Stage::Upload, start).await?;

        let upload_url = start
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::upstream(Stage::Upload, "response carried no upload URL", None)
            })?;

        let finish = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(payload.bytes.clone())
            .send()
            .await
            .map_err(|e| PipelineError::transport(Stage::Upload, e))?;
        let finish = check_status(Stage::Upload, finish).await?;

        let uploaded: UploadResponse = finish.json().await.map_err(|e| {
            PipelineError::upstream(
                Stage::Upload,
                format!("failed to parse upload response: {}", e),
                None,
            )
        })?;

        let uri = uploaded.file.uri.ok_or_else(|| {
            PipelineError::upstream(Stage::Upload, "uploaded file has no URI", None)
        })?;
        tracing::info!(
            "uploaded file {} as {}",
            uploaded
                .file
                .display_name
                .as_deref()
                .unwrap_or(UPLOAD_DISPLAY_NAME),
            uri
        );

        Ok(FileReference {
            uri,
            mime_type: uploaded
                .file
                .mime_type
                .unwrap_or_else(|| payload.mime_type.clone()),
        })
    }

    async fn send_instruction(&self, session: &ExtractionSession) -> PipelineResult<RawResponse> {
        let body = GenerateRequest {
            contents: session.contents().map(content_to_wire).collect(),
            generation_config: GenerationConfig::from(&session.sampling),
        };

        let url = self.endpoint(&format!("v1beta/models/{}:generateContent", session.model));
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::transport(Stage::Chat, e))?;
        let resp = check_status(Stage::Chat, resp).await?;

        let generated: GenerateResponse = resp.json().await.map_err(|e| {
            PipelineError::upstream(
                Stage::Chat,
                format!("failed to parse generateContent response: {}", e),
                None,
            )
        })?;

        let parts = generated
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(part_from_wire).collect())
            .unwrap_or_default();

        Ok(RawResponse { parts })
    }
}

async fn check_status(
    stage: Stage,
    resp: reqwest::Response,
) -> PipelineResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    Err(PipelineError::upstream(
        stage,
        format!("HTTP {}: {}", status, text.trim()),
        Some(status.as_u16()),
    ))
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct UploadStart<'a> {
    file: UploadMetadata<'a>,
}

#[derive(Serialize)]
struct UploadMetadata<'a> {
    display_name: &'a str,
}

#[derive(Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteFile {
    display_name: Option<String>,
    uri: Option<String>,
    mime_type: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Value>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
    response_mime_type: String,
}

impl From<&SamplingPolicy> for GenerationConfig {
    fn from(sampling: &SamplingPolicy) -> Self {
        Self {
            temperature: sampling.temperature,
            top_k: sampling.top_k,
            top_p: sampling.top_p,
            max_output_tokens: sampling.max_output_tokens,
            response_mime_type: sampling.response_mime_type.clone(),
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Value>,
}

fn content_to_wire(content: &Content) -> Value {
    json!({
        "role": content.role,
        "parts": content.parts.iter().map(part_to_wire).collect::<Vec<_>>(),
    })
}

fn part_to_wire(part: &Part) -> Value {
    match part {
        Part::Text(text) => json!({ "text": text }),
        Part::FileData {
            mime_type,
            file_uri,
        } => json!({ "fileData": { "mimeType": mime_type, "fileUri": file_uri } }),
        Part::Other(value) => value.clone(),
    }
}

fn part_from_wire(value: Value) -> Part {
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        return Part::Text(text.to_string());
    }
    if let Some(file) = value.get("fileData") {
        let mime_type = file.get("mimeType").and_then(Value::as_str);
        let file_uri = file.get("fileUri").and_then(Value::as_str);
        if let (Some(mime_type), Some(file_uri)) = (mime_type, file_uri) {
            return Part::FileData {
                mime_type: mime_type.to_string(),
                file_uri: file_uri.to_string(),
            };
        }
    }
    Part::Other(value)
}
