use std::fmt;

// ── Pipeline stages ──────────────────────────────────────────────────────────

/// Remote call a failure or deadline belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Upload,
    Chat,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Upload => f.write_str("upload"),
            Stage::Chat => f.write_str("chat"),
        }
    }
}

// ── Pipeline errors ──────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no API key supplied and GEMINI_API_KEY is not set")]
    MissingCredential,

    /// `transient` marks connect and timeout failures that never got a response.
    #[error("error uploading file: {message}")]
    UpstreamUpload {
        message: String,
        status_code: Option<u16>,
        transient: bool,
    },

    #[error("error sending message: {message}")]
    UpstreamChat {
        message: String,
        status_code: Option<u16>,
        transient: bool,
    },

    #[error("error processing image: no alias in model response")]
    NoAliasExtracted,

    #[error("{stage} timed out after {timeout_ms}ms")]
    Timeout { stage: Stage, timeout_ms: u64 },

    #[error("{stage} cancelled")]
    Cancelled { stage: Stage },
}

impl PipelineError {
    /// Build the stage-specific upstream error for a failed remote call.
    pub fn upstream(stage: Stage, message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::upstream_with(stage, message.into(), status_code, false)
    }

    fn upstream_with(
        stage: Stage,
        message: String,
        status_code: Option<u16>,
        transient: bool,
    ) -> Self {
        match stage {
            Stage::Upload => PipelineError::UpstreamUpload {
                message,
                status_code,
                transient,
            },
            Stage::Chat => PipelineError::UpstreamChat {
                message,
                status_code,
                transient,
            },
        }
    }

    /// Classify a transport-level `reqwest` failure for the given stage.
    pub fn transport(stage: Stage, e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            format!("TimeoutError: request timed out: {}", e)
        } else if e.is_connect() {
            format!("ConnectError: failed to connect: {}", e)
        } else {
            format!("RequestError: {}", e)
        };
        let transient = e.is_timeout() || e.is_connect();
        Self::upstream_with(stage, message, e.status().map(|s| s.as_u16()), transient)
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

// ── Configuration errors ─────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

// ── Boundary errors ──────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Failed to parse form")]
    InvalidForm,
    #[error("Error retrieving the file")]
    MissingImage,
}
