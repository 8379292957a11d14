//! Image → alias pipeline: resolve credential, upload, ask, normalize.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::credential::CredentialResolver;
use crate::error::{PipelineResult, Stage};
use crate::models::{Alias, ImagePayload};
use crate::normalize::{matches_alias_grammar, normalize};
use crate::retry::{self, Deadline, RetryPolicy};
use crate::session::{ExtractionPolicy, ExtractionSession};
use crate::vision::VisionService;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Budget shared by upload and chat for one invocation.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

pub struct AliasPipeline {
    resolver: CredentialResolver,
    service: Arc<dyn VisionService>,
    policy: ExtractionPolicy,
    options: PipelineOptions,
}

impl AliasPipeline {
    pub fn new(
        resolver: CredentialResolver,
        service: Arc<dyn VisionService>,
        policy: ExtractionPolicy,
        options: PipelineOptions,
    ) -> Self {
        Self {
            resolver,
            service,
            policy,
            options,
        }
    }

    pub fn from_config(config: &Config, service: Arc<dyn VisionService>) -> Self {
        Self::new(
            CredentialResolver::new(config.default_credential.clone()),
            service,
            ExtractionPolicy::for_model(config.model.clone()),
            PipelineOptions {
                request_timeout: config.request_timeout,
                retry: RetryPolicy {
                    attempts: config.retry_attempts,
                    base_delay_ms: config.retry_delay_ms,
                },
            },
        )
    }

    /// Run one invocation. The first failing stage's error is returned as is.
    pub async fn extract_alias(
        &self,
        image: &ImagePayload,
        explicit_credential: Option<&str>,
        cancel: &CancellationToken,
    ) -> PipelineResult<Alias> {
        let credential = self.resolver.resolve(explicit_credential)?;
        let deadline = Deadline::after(self.options.request_timeout);

        // Released on every return path when `client` drops.
        let client = self.service.connect(&credential)?;
        let client = client.as_ref();
        tracing::debug!("opened {} session", self.service.name());

        let file = retry::run(Stage::Upload, &self.options.retry, &deadline, cancel, move || {
            client.upload(image)
        })
        .await?;

        let session = ExtractionSession::start(&file, &self.policy);
        let session = &session;
        let response = retry::run(Stage::Chat, &self.options.retry, &deadline, cancel, move || {
            client.send_instruction(session)
        })
        .await?;

        let alias = normalize(response)?;
        if !matches_alias_grammar(&alias) {
            tracing::warn!(
                "alias {:?} does not match the expected alias format",
                alias.as_str()
            );
        }
        tracing::info!("extracted alias {}", alias.as_str());
        Ok(alias)
    }
}
