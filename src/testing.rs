//! Scripted remote-service double shared by unit tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PipelineResult;
use crate::models::{Credential, FileReference, ImagePayload, Part, RawResponse};
use crate::session::ExtractionSession;
use crate::vision::{VisionService, VisionSession};

type UploadFn = dyn Fn(u32) -> PipelineResult<FileReference> + Send + Sync;
type ChatFn = dyn Fn(u32) -> PipelineResult<RawResponse> + Send + Sync;

pub fn chat_text(text: &str) -> RawResponse {
    RawResponse {
        parts: vec![Part::Text(text.to_string())],
    }
}

struct Script {
    upload_fn: Box<UploadFn>,
    chat_fn: Box<ChatFn>,
    chat_delay: Option<Duration>,
    connects: AtomicU32,
    uploads: AtomicU32,
    chats: AtomicU32,
    credentials: Mutex<Vec<String>>,
    last_session: Mutex<Option<ExtractionSession>>,
}

/// Service double. Each call index is passed to the scripted closures so
/// tests can vary results per attempt; clones share counters.
#[derive(Clone)]
pub struct ScriptedService {
    script: Arc<Script>,
}

impl ScriptedService {
    pub fn replying(reply: RawResponse) -> Self {
        Self::build(
            Box::new(|call| {
                Ok(FileReference {
                    uri: format!("https://files.test/{}", call + 1),
                    mime_type: "image/png".to_string(),
                })
            }),
            Box::new(move |_| Ok(reply.clone())),
            None,
        )
    }

    fn build(upload_fn: Box<UploadFn>, chat_fn: Box<ChatFn>, chat_delay: Option<Duration>) -> Self {
        Self {
            script: Arc::new(Script {
                upload_fn,
                chat_fn,
                chat_delay,
                connects: AtomicU32::new(0),
                uploads: AtomicU32::new(0),
                chats: AtomicU32::new(0),
                credentials: Mutex::new(Vec::new()),
                last_session: Mutex::new(None),
            }),
        }
    }

    fn rebuild(self, f: impl FnOnce(Script) -> Script) -> Self {
        let script = Arc::try_unwrap(self.script)
            .unwrap_or_else(|_| panic!("configure ScriptedService before sharing it"));
        Self {
            script: Arc::new(f(script)),
        }
    }

    pub fn with_upload<F>(self, f: F) -> Self
    where
        F: Fn(u32) -> PipelineResult<FileReference> + Send + Sync + 'static,
    {
        self.rebuild(|mut s| {
            s.upload_fn = Box::new(f);
            s
        })
    }

    pub fn with_chat<F>(self, f: F) -> Self
    where
        F: Fn(u32) -> PipelineResult<RawResponse> + Send + Sync + 'static,
    {
        self.rebuild(|mut s| {
            s.chat_fn = Box::new(f);
            s
        })
    }

    pub fn with_chat_delay(self, delay: Duration) -> Self {
        self.rebuild(|mut s| {
            s.chat_delay = Some(delay);
            s
        })
    }

    pub fn connects(&self) -> u32 {
        self.script.connects.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> u32 {
        self.script.uploads.load(Ordering::SeqCst)
    }

    pub fn chats(&self) -> u32 {
        self.script.chats.load(Ordering::SeqCst)
    }

    pub fn credentials(&self) -> Vec<String> {
        self.script.credentials.lock().unwrap().clone()
    }

    pub fn last_session(&self) -> Option<ExtractionSession> {
        self.script.last_session.lock().unwrap().clone()
    }
}

impl VisionService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    fn connect(&self, credential: &Credential) -> PipelineResult<Box<dyn VisionSession>> {
        self.script.connects.fetch_add(1, Ordering::SeqCst);
        self.script
            .credentials
            .lock()
            .unwrap()
            .push(credential.expose().to_string());
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
        }))
    }
}

struct ScriptedSession {
    script: Arc<Script>,
}

#[async_trait]
impl VisionSession for ScriptedSession {
    async fn upload(&self, _payload: &ImagePayload) -> PipelineResult<FileReference> {
        let call = self.script.uploads.fetch_add(1, Ordering::SeqCst);
        (self.script.upload_fn)(call)
    }

    async fn send_instruction(&self, session: &ExtractionSession) -> PipelineResult<RawResponse> {
        let call = self.script.chats.fetch_add(1, Ordering::SeqCst);
        *self.script.last_session.lock().unwrap() = Some(session.clone());
        if let Some(delay) = self.script.chat_delay {
            tokio::time::sleep(delay).await;
        }
        (self.script.chat_fn)(call)
    }
}
