use std::fmt;

use serde::Serialize;
use serde_json::Value;

pub const PNG_MIME_TYPE: &str = "image/png";

// ── Pipeline input ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: PNG_MIME_TYPE.to_string(),
        }
    }
}

/// API key for the remote service. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

// ── Remote service values ────────────────────────────────────────────────────

/// Handle to an uploaded image in the remote service's storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    pub uri: String,
    pub mime_type: String,
}

/// One content part of a conversation turn or model answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    FileData { mime_type: String, file_uri: String },
    Other(Value),
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Part::Text(text) => f.write_str(text),
            Part::FileData {
                mime_type,
                file_uri,
            } => write!(f, "{{{} {}}}", mime_type, file_uri),
            Part::Other(value) => write!(f, "{}", value),
        }
    }
}

/// Ordered content parts of the first candidate; empty when the model gave none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Alias(pub String);

impl Alias {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ── HTTP bodies ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AliasResponse {
    pub alias: Alias,
}
