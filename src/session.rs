//! Single-turn conversation used to ask the model for the alias.
//!
//! History holds exactly one user turn with the uploaded file; the
//! extraction instruction follows as the message that is actually sent.

use crate::models::{FileReference, Part};

pub const USER_ROLE: &str = "user";

/// Instruction sent after the image. Kept in the service's operating locale.
pub const ALIAS_INSTRUCTION: &str = "El `alias` es un string alfanumérico donde no se permiten \
espacios ni caracteres especiales, excepto el punto, los espacios al principio, al final o entre \
las palabras no estan permitidos. Identifica un alias en la imagen provista y extraelo retornando \
unicamente el string identificado, transformando todas las letras a minuscúlas.";

pub const RESPONSE_MIME_TYPE: &str = "text/plain";

/// Generation parameters. Fixed per deployment, never taken from a request.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingPolicy {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 8192,
            response_mime_type: RESPONSE_MIME_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionPolicy {
    pub model: String,
    pub instruction: String,
    pub sampling: SamplingPolicy,
}

impl ExtractionPolicy {
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            instruction: ALIAS_INSTRUCTION.to_string(),
            sampling: SamplingPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

/// Ephemeral conversation state for one invocation.
#[derive(Debug, Clone)]
pub struct ExtractionSession {
    pub model: String,
    pub sampling: SamplingPolicy,
    pub history: Vec<Content>,
    pub message: Content,
}

impl ExtractionSession {
    /// Seed the history with the file reference alone, no accompanying text.
    pub fn start(file: &FileReference, policy: &ExtractionPolicy) -> Self {
        Self {
            model: policy.model.clone(),
            sampling: policy.sampling.clone(),
            history: vec![Content {
                role: USER_ROLE.to_string(),
                parts: vec![Part::FileData {
                    mime_type: file.mime_type.clone(),
                    file_uri: file.uri.clone(),
                }],
            }],
            message: Content {
                role: USER_ROLE.to_string(),
                parts: vec![Part::Text(policy.instruction.clone())],
            },
        }
    }

    /// Full turn list as sent to the remote service: history, then the message.
    pub fn contents(&self) -> impl Iterator<Item = &Content> {
        self.history.iter().chain(std::iter::once(&self.message))
    }
}
