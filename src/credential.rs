use crate::error::{PipelineError, PipelineResult};
use crate::models::Credential;

/// Chooses the credential for one pipeline invocation.
#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    default: Option<Credential>,
}

impl CredentialResolver {
    pub fn new(default: Option<Credential>) -> Self {
        Self { default }
    }

    /// A non-empty caller-supplied key wins over the configured default.
    pub fn resolve(&self, explicit: Option<&str>) -> PipelineResult<Credential> {
        if let Some(key) = explicit.filter(|k| !k.is_empty()) {
            tracing::debug!("using request API key");
            return Ok(Credential::new(key));
        }
        match &self.default {
            Some(default) => {
                tracing::debug!("using default API key");
                Ok(default.clone())
            }
            None => Err(PipelineError::MissingCredential),
        }
    }
}
