//! Single-flight generation session
//!
//! `Idle -> Generating -> {Success, Failed}`. Only one request is outstanding at a
//! time; a second `generate` while generating is dropped, not queued. Dropping a
//! pending `generate` future returns the session to `Idle`.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use crate::clients::{BackendError, GenerationBackend, GenerationRequest};
use crate::composer::DesignRequest;
use crate::config::{Config, GenerationSettings, StatusConfig};
use crate::normalizer::{self, GeneratedOutput, ParseError};
use crate::status::StatusTicker;

pub const FAILURE_PREFIX: &str = "Failed to generate files";
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred. Check the logs for details.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Generating,
    Success,
    Failed,
}

/// Why an invocation was dropped without doing anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Busy,
    EmptyDescription,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    Skipped(SkipReason),
    Succeeded(GeneratedOutput),
    Failed(String),
}

/// UI-facing snapshot of the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub phase: Phase,
    pub error: Option<String>,
    pub result: Option<GeneratedOutput>,
    pub active: Option<String>,
    pub busy: bool,
    pub status_text: String,
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    error: Option<String>,
    result: Option<GeneratedOutput>,
    active: Option<String>,
    ticker: Option<StatusTicker>,
}

enum CallError {
    Backend(BackendError),
    Parse(ParseError),
}

pub struct GenerationSession {
    backend: Arc<dyn GenerationBackend>,
    model: String,
    settings: GenerationSettings,
    status: StatusConfig,
    status_tx: watch::Sender<String>,
    inner: Mutex<Inner>,
}

impl GenerationSession {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        model: impl Into<String>,
        settings: GenerationSettings,
        status: StatusConfig,
    ) -> Self {
        let (status_tx, _) = watch::channel(String::new());
        Self {
            backend,
            model: model.into(),
            settings,
            status,
            status_tx,
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                error: None,
                result: None,
                active: None,
                ticker: None,
            }),
        }
    }

    pub fn from_config(backend: Arc<dyn GenerationBackend>, config: &Config) -> Self {
        Self::new(
            backend,
            config.provider.model.clone(),
            config.generation.clone(),
            config.status.clone(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> ViewState {
        let inner = self.lock();
        ViewState {
            phase: inner.phase,
            error: inner.error.clone(),
            result: inner.result.clone(),
            active: inner.active.clone(),
            busy: inner.phase == Phase::Generating,
            status_text: self.status_tx.borrow().clone(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.lock().phase == Phase::Generating
    }

    /// Receiver for the rotating status text
    pub fn subscribe_status(&self) -> watch::Receiver<String> {
        self.status_tx.subscribe()
    }

    /// Switch the displayed deliverable. Returns false if the key is not in the result.
    pub fn select(&self, key: &str) -> bool {
        let mut inner = self.lock();
        let present = inner
            .result
            .as_ref()
            .is_some_and(|r| r.contains_key(key));
        if present {
            inner.active = Some(key.to_string());
        }
        present
    }

    pub async fn generate(&self, request: &DesignRequest) -> GenerateOutcome {
        {
            let mut inner = self.lock();
            if inner.phase == Phase::Generating {
                tracing::debug!("generate ignored: a request is already in flight");
                return GenerateOutcome::Skipped(SkipReason::Busy);
            }
            if request.description.trim().is_empty() {
                tracing::debug!("generate ignored: empty description");
                return GenerateOutcome::Skipped(SkipReason::EmptyDescription);
            }
            inner.phase = Phase::Generating;
            inner.error = None;
            inner.result = None;
            inner.active = None;
            inner.ticker = Some(StatusTicker::start(
                self.status.messages.clone(),
                Duration::from_millis(self.status.interval_ms),
                self.status_tx.clone(),
            ));
        }

        let in_flight = InFlight::new(self);

        tracing::info!(
            "Generating {} deliverable(s) in {} with model {}",
            request.requested_deliverables.len(),
            request.hdl_language,
            self.model
        );

        let outcome = self.call(request).await;

        let ticker = self.lock().ticker.take();
        if let Some(ticker) = ticker {
            ticker.shutdown().await;
        }
        self.status_tx.send_replace(String::new());

        let mut inner = self.lock();
        let finished = match outcome {
            Ok(output) => {
                tracing::info!(
                    "Generation succeeded with {} file(s): {}",
                    output.len(),
                    output.keys().collect::<Vec<_>>().join(", ")
                );
                inner.phase = Phase::Success;
                inner.active = output.first_key().map(str::to_string);
                inner.result = Some(output.clone());
                GenerateOutcome::Succeeded(output)
            }
            Err(err) => {
                let message = failure_message(&err);
                match &err {
                    CallError::Backend(e) => tracing::error!("Generation call failed: {:?}", e),
                    CallError::Parse(e) => tracing::error!("Generation reply unparseable: {}", e),
                }
                inner.phase = Phase::Failed;
                inner.error = Some(message.clone());
                GenerateOutcome::Failed(message)
            }
        };
        drop(inner);
        in_flight.complete();
        finished
    }

    async fn call(&self, request: &DesignRequest) -> Result<GeneratedOutput, CallError> {
        let composed = request.compose();
        let outbound = GenerationRequest {
            model: self.model.clone(),
            prompt: composed.prompt,
            schema: composed.schema,
        };

        let raw = self
            .backend
            .generate(&outbound)
            .await
            .map_err(CallError::Backend)?;

        let text = if self.settings.strip_code_fences {
            normalizer::strip_code_fences(&raw)
        } else {
            raw.as_str()
        };

        let output = normalizer::normalize(text).map_err(CallError::Parse)?;
        Ok(if self.settings.canonical_order {
            output.into_canonical_order()
        } else {
            output
        })
    }
}

/// Resets the session to `Idle` and stops the ticker if a `generate` future is
/// dropped before it reaches a terminal phase
struct InFlight<'a> {
    session: &'a GenerationSession,
    completed: bool,
}

impl<'a> InFlight<'a> {
    fn new(session: &'a GenerationSession) -> Self {
        Self {
            session,
            completed: false,
        }
    }

    fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let ticker = {
            let mut inner = self.session.lock();
            inner.phase = Phase::Idle;
            inner.ticker.take()
        };
        if let Some(ticker) = ticker {
            ticker.stop();
        }
        self.session.status_tx.send_replace(String::new());
        tracing::warn!("generate cancelled before the reply arrived; session reset to idle");
    }
}

fn failure_message(err: &CallError) -> String {
    let detail = match err {
        CallError::Backend(e) => e.detail(),
        CallError::Parse(e) => Some(e.to_string()),
    };
    match detail {
        Some(d) => format!("{}: {}", FAILURE_PREFIX, d),
        None => UNKNOWN_ERROR_MESSAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deliverables::HdlLanguage;
    use async_trait::async_trait;

    struct FixedBackend(std::result::Result<&'static str, fn() -> BackendError>);

    #[async_trait]
    impl GenerationBackend for FixedBackend {
        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> std::result::Result<String, BackendError> {
            match &self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(make) => Err(make()),
            }
        }
    }

    fn session(backend: FixedBackend, settings: GenerationSettings) -> GenerationSession {
        GenerationSession::new(
            Arc::new(backend),
            "test-model",
            settings,
            StatusConfig::default(),
        )
    }

    fn request(description: &str) -> DesignRequest {
        DesignRequest::new(
            description,
            HdlLanguage::Verilog,
            vec!["rtlCode".into(), "testbench".into()],
        )
    }

    const REPLY: &str = r#"{"testbench": {"filename":"tb.sv","language":"SystemVerilog","code":"tb"},
                           "rtlCode": {"filename":"dut.v","language":"Verilog","code":"rtl"},
                           "testCases": false}"#;

    #[tokio::test]
    async fn test_success_selects_first_reply_key() {
        let s = session(FixedBackend(Ok(REPLY)), GenerationSettings::default());
        let outcome = s.generate(&request("a counter")).await;
        assert!(matches!(outcome, GenerateOutcome::Succeeded(ref o) if o.len() == 2));

        let view = s.snapshot();
        assert_eq!(view.phase, Phase::Success);
        assert_eq!(view.active.as_deref(), Some("testbench"));
        assert!(!view.busy);
        assert!(view.error.is_none());
        assert_eq!(view.status_text, "");
    }

    #[tokio::test]
    async fn test_canonical_order_setting_changes_active() {
        let settings = GenerationSettings {
            canonical_order: true,
            ..Default::default()
        };
        let s = session(FixedBackend(Ok(REPLY)), settings);
        s.generate(&request("a counter")).await;
        assert_eq!(s.snapshot().active.as_deref(), Some("rtlCode"));
    }

    #[tokio::test]
    async fn test_empty_description_is_skipped() {
        let s = session(FixedBackend(Ok(REPLY)), GenerationSettings::default());
        let outcome = s.generate(&request("   \n\t")).await;
        assert_eq!(outcome, GenerateOutcome::Skipped(SkipReason::EmptyDescription));
        assert_eq!(s.snapshot().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_parse_failure_surfaces_prefixed_message() {
        let s = session(FixedBackend(Ok("not json")), GenerationSettings::default());
        let outcome = s.generate(&request("a counter")).await;
        let GenerateOutcome::Failed(message) = outcome else {
            panic!("expected failure");
        };
        assert!(message.starts_with(FAILURE_PREFIX));
        let view = s.snapshot();
        assert_eq!(view.phase, Phase::Failed);
        assert_eq!(view.error.as_deref(), Some(message.as_str()));
        assert!(view.result.is_none());
    }

    #[tokio::test]
    async fn test_fenced_reply_parses_when_stripping_enabled() {
        let settings = GenerationSettings {
            strip_code_fences: true,
            ..Default::default()
        };
        let fenced: &'static str =
            "```json\n{\"rtlCode\": {\"filename\":\"a.v\",\"language\":\"Verilog\",\"code\":\"m\"}}\n```";
        let s = session(FixedBackend(Ok(fenced)), settings);
        assert!(matches!(
            s.generate(&request("x")).await,
            GenerateOutcome::Succeeded(_)
        ));
    }

    #[tokio::test]
    async fn test_unknown_backend_error_uses_fallback_message() {
        let s = session(
            FixedBackend(Err(|| BackendError::Unknown)),
            GenerationSettings::default(),
        );
        assert_eq!(
            s.generate(&request("x")).await,
            GenerateOutcome::Failed(UNKNOWN_ERROR_MESSAGE.to_string())
        );
    }

    #[tokio::test]
    async fn test_provider_error_includes_detail() {
        let s = session(
            FixedBackend(Err(|| BackendError::Provider {
                status: 429,
                message: "quota exceeded".into(),
            })),
            GenerationSettings::default(),
        );
        let GenerateOutcome::Failed(message) = s.generate(&request("x")).await else {
            panic!("expected failure");
        };
        assert_eq!(
            message,
            "Failed to generate files: provider returned 429: quota exceeded"
        );
    }

    #[tokio::test]
    async fn test_select_only_accepts_present_keys() {
        let s = session(FixedBackend(Ok(REPLY)), GenerationSettings::default());
        assert!(!s.select("rtlCode"));
        s.generate(&request("a counter")).await;
        assert!(s.select("rtlCode"));
        assert_eq!(s.snapshot().active.as_deref(), Some("rtlCode"));
        assert!(!s.select("testCases"));
        assert_eq!(s.snapshot().active.as_deref(), Some("rtlCode"));
    }
}
